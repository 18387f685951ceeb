use std::fs;
use std::path::{Path, PathBuf};

use brine_sdl_compiler::{compile_schema, error::SdlError, Compiler, CompilerConfig, Target};
use brine_sdl_validator::validate;
use serde_json::json;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

fn demo_schema() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../example/schema/agent.sdl")
}

#[test]
fn test_required_follows_optionality() {
    let (_, schema) = compile_schema("type Person { name: string\n age: integer\n email?: string }").unwrap();
    let person = &schema["definitions"]["Person"];
    assert_eq!(person["required"], json!(["name", "age"]));
    let properties = person["properties"].as_object().unwrap();
    assert_eq!(properties.keys().collect::<Vec<_>>(), vec!["name", "age", "email"]);
    assert_eq!(properties["email"], json!({"type": "string"}));
}

#[test]
fn test_enum_reference_keeps_member_order() {
    let (_, schema) = compile_schema("enum Status { active, inactive }\nagent User { status: Status }").unwrap();
    assert_eq!(schema["properties"]["status"], json!({"$ref": "#/definitions/Status"}));
    assert_eq!(schema["definitions"]["Status"]["enum"], json!(["active", "inactive"]));
}

#[test]
fn test_self_referencing_type() {
    let (_, schema) = compile_schema("type Node { value: string\n children: Node[] }").unwrap();
    assert_eq!(
        schema["definitions"]["Node"]["properties"]["children"],
        json!({"type": "array", "items": {"$ref": "#/definitions/Node"}})
    );
}

#[test]
fn test_unresolved_reference() {
    let err = compile_schema("type X { y: Undeclared }").unwrap_err();
    assert!(matches!(err, SdlError::UnresolvedReference { .. }));
    let message = err.to_string();
    assert!(message.contains("Undeclared"), "{}", message);
    assert!(message.contains("\"y\""), "{}", message);
}

#[test]
fn test_mutual_imports_are_circular() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a.sdl", "import \"./b.sdl\"\ntype A { x: string }");
    write(dir.path(), "b.sdl", "import \"./a.sdl\"\ntype B { y: string }");

    match Compiler::default().compile_file(&a) {
        Err(err @ SdlError::CircularImport { .. }) => {
            assert_eq!(err.to_string(), "circular import: a.sdl -> b.sdl -> a.sdl");
        }
        other => panic!("expected CircularImport, got {:?}", other),
    }
}

#[test]
fn test_qualified_name_wins_inside_aliased_module() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "geo.sdl", "type Address { lat: number }\ntype Place { at: Address }");
    let root = write(
        dir.path(),
        "trip.sdl",
        "import \"./geo\" as geo\ntype Address { street: string }\nagent Trip { stop: geo.Place\n home: Address }",
    );

    let compilation = Compiler::default().compile_file(&root).unwrap();
    let schema = &compilation.schema;
    assert_eq!(schema["properties"]["stop"]["$ref"], "#/definitions/geo.Place");
    assert_eq!(schema["properties"]["home"]["$ref"], "#/definitions/Address");
    assert_eq!(
        schema["definitions"]["geo.Place"]["properties"]["at"]["$ref"],
        "#/definitions/geo.Address"
    );
    assert_eq!(compilation.modules.len(), 2);
}

#[test]
fn test_root_relative_directory_import() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "shared/index.sdl", "type Id { value: string }");
    let main = write(dir.path(), "app/main.sdl", "import \"@/shared\" as shared\nagent App { id: shared.Id }");

    let compiler = Compiler::new(CompilerConfig {
        project_root: Some(dir.path().to_path_buf()),
        ..CompilerConfig::default()
    });
    let compilation = compiler.compile_file(&main).unwrap();
    assert_eq!(compilation.schema["title"], "App");
    assert!(compilation.schema["definitions"]["shared.Id"].is_object());
}

#[test]
fn test_compiled_schema_accepts_conforming_instance() {
    let compilation = Compiler::default().compile_file(&demo_schema()).unwrap();
    let instance = json!({
        "name": "helper",
        "model": "gpt-4.1-mini",
        "mode": "careful",
        "temperature": 0.3,
        "tools": [{"name": "web_search", "timeoutSeconds": 30}]
    });
    assert_eq!(validate(&compilation.schema, &instance).unwrap(), vec![]);

    let broken = json!({
        "name": "",
        "model": "GPT 4",
        "mode": "careful",
        "temperature": 3.5,
        "tools": [{"name": "Web Search", "timeoutSeconds": 0}]
    });
    let violations = validate(&compilation.schema, &broken).unwrap();
    let mut found: Vec<(String, String)> = violations
        .into_iter()
        .map(|v| (v.path, v.constraint))
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![
            ("/model".to_string(), "pattern".to_string()),
            ("/name".to_string(), "minLength".to_string()),
            ("/temperature".to_string(), "maximum".to_string()),
            ("/tools/0/name".to_string(), "pattern".to_string()),
            ("/tools/0/timeoutSeconds".to_string(), "minimum".to_string()),
        ]
    );
}

#[test]
fn test_recompiling_is_idempotent() {
    let compiler = Compiler::new(CompilerConfig {
        targets: vec![Target::Rust, Target::TypeScript],
        ..CompilerConfig::default()
    });
    let first = compiler.compile_file(&demo_schema()).unwrap();
    let second = compiler.compile_file(&demo_schema()).unwrap();
    assert_eq!(
        serde_json::to_string(&first.schema).unwrap(),
        serde_json::to_string(&second.schema).unwrap()
    );
    assert_eq!(first.bindings, second.bindings);
}

#[test]
fn test_checked_in_rust_bindings_are_current() {
    let compiler = Compiler::new(CompilerConfig {
        targets: vec![Target::Rust],
        ..CompilerConfig::default()
    });
    let compilation = compiler.compile_file(&demo_schema()).unwrap();
    let (target, code) = &compilation.bindings[0];
    assert_eq!(*target, Target::Rust);
    assert_eq!(code.as_str(), include_str!("../../example/src/generated.rs"));
}

#[test]
fn test_typescript_bindings_for_demo() {
    let compiler = Compiler::new(CompilerConfig {
        targets: vec![Target::TypeScript],
        ..CompilerConfig::default()
    });
    let compilation = compiler.compile_file(&demo_schema()).unwrap();
    let code = &compilation.bindings[0].1;
    assert!(code.contains("export type Mode = \"fast\" | \"careful\";"));
    assert!(code.contains("export interface Assistant {"));
    assert!(code.contains("  temperature?: number;"));
    assert!(code.contains("  tools: CommonTool[];"));
    assert!(code.contains("  timeoutSeconds?: number;"));
}

#[test]
fn test_first_error_aborts() {
    // Both declarations are broken; only the duplicate is reported.
    let err = compile_schema("type A { x: string }\ntype A { y: Missing }").unwrap_err();
    assert!(matches!(err, SdlError::DuplicateDeclaration { .. }), "{:?}", err);
}
