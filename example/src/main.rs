// example/src/main.rs

mod generated;

use std::path::PathBuf;

use brine_sdl::{validate, Compiler, SdlError};

// Bring the generated types into scope:
use generated::{Assistant, CommonTool, Mode};

fn main() -> Result<(), SdlError> {
    // Compile schema/agent.sdl (and the common module it imports).
    let source = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schema").join("agent.sdl");
    let compilation = Compiler::default().compile_file(&source)?;
    println!("compiled {} module(s), {} type(s)", compilation.modules.len(), compilation.registry.len());

    // A configuration built through the generated bindings.
    let assistant = Assistant {
        name:        "helper".to_string(),
        model:       "gpt-4.1-mini".to_string(),
        mode:        Mode::Careful,
        temperature: Some(0.3),
        tools:       vec![CommonTool {
            name:            "web_search".to_string(),
            description:     None,
            timeout_seconds: Some(30),
        }],
    };

    let instance = serde_json::to_value(&assistant).map_err(|e| SdlError::Internal(e.to_string()))?;
    println!("{}", serde_json::to_string_pretty(&instance).map_err(|e| SdlError::Internal(e.to_string()))?);

    let violations = validate(&compilation.schema, &instance).map_err(|e| SdlError::Internal(e.to_string()))?;
    println!("violations: {}", violations.len());

    // Round-trip a hand-written document that breaks a few rules.
    let broken = serde_json::json!({
        "name": "",
        "model": "GPT 4",
        "mode": "careful",
        "temperature": 3.5,
        "tools": [{"name": "Web Search", "timeoutSeconds": 0}]
    });
    let violations = validate(&compilation.schema, &broken).map_err(|e| SdlError::Internal(e.to_string()))?;
    for violation in &violations {
        println!("  {}", violation);
    }

    let parsed: Assistant = serde_json::from_value(broken).map_err(|e| SdlError::Internal(e.to_string()))?;
    println!("mode = {:?}, tools = {}", parsed.mode, parsed.tools.len());

    Ok(())
}
