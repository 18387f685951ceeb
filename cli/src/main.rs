use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, SystemTime};

use brine_sdl::validate_json;
use brine_sdl_compiler::error::SdlError;
use brine_sdl_compiler::{diff_fields, Compilation, Compiler, CompilerConfig, Target};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const WATCH_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "bsdl")]
#[command(about = "Compile SDL schemas to JSON Schema and language bindings", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a `.sdl` module (and its imports) to a JSON Schema document
    Compile {
        /// Root `.sdl` file or a directory containing `index.sdl`
        source: PathBuf,

        /// Output schema file (defaults to the source name + `.schema.json`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Binding target to generate (`rust`, `typescript`); repeatable
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// Directory for generated bindings (defaults to the schema's directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Project root for `@/` imports
        #[arg(long)]
        root: Option<PathBuf>,

        /// Hand-authored schema to diff the output against
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Recompile whenever a source module changes
        #[arg(long)]
        watch: bool,

        /// JSON compiler configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the full pipeline without writing anything
    Check {
        source: PathBuf,

        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Print the resolved type registry as JSON
    Inspect {
        source: PathBuf,

        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Validate a JSON instance against a schema document
    Validate {
        #[arg(short, long)]
        schema: PathBuf,

        #[arg(short, long)]
        instance: PathBuf,
    },
}

/// Resolved options for one `compile` invocation.
struct CompileJob {
    source:   PathBuf,
    output:   PathBuf,
    out_dir:  PathBuf,
    baseline: Option<PathBuf>,
    compiler: Compiler,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_output(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "schema".to_string());
    let dir = if source.is_dir() {
        source.to_path_buf()
    } else {
        source.parent().map(Path::to_path_buf).unwrap_or_default()
    };
    dir.join(format!("{}.schema.json", stem))
}

/// `agent.schema.json` and `agent.json` both give `agent`.
fn bindings_stem(output: &Path) -> String {
    let name = output
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(stem) = name.strip_suffix(".schema.json").filter(|s| !s.is_empty()) {
        return stem.to_string();
    }
    output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "schema".to_string())
}

fn load_config(config: Option<&Path>, root: Option<PathBuf>) -> Result<CompilerConfig, SdlError> {
    let mut config = match config {
        Some(path) => CompilerConfig::from_json_file(path)?,
        None => CompilerConfig::default(),
    };
    if root.is_some() {
        config.project_root = root;
    }
    Ok(config)
}

impl CompileJob {
    /// Produces every artifact in memory, then writes them all.
    fn run(&self) -> Result<Compilation, SdlError> {
        let compilation = self.compiler.compile_file(&self.source)?;

        let schema = serde_json::to_string_pretty(&compilation.schema)
            .map_err(|e| SdlError::Internal(e.to_string()))?;

        if let Some(baseline) = &self.baseline {
            let text = fs::read_to_string(baseline)?;
            let baseline: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| SdlError::Config(format!("{}: {}", baseline.display(), e)))?;
            let report = diff_fields(&compilation.schema, &baseline);
            for name in &report.added {
                eprintln!("baseline: added field {}", name);
            }
            for name in &report.removed {
                eprintln!("baseline: removed field {}", name);
            }
            for name in &report.changed {
                eprintln!("baseline: changed field {}", name);
            }
            if !report.is_compatible() {
                warn!("emitted schema is not compatible with the baseline");
            }
        }

        let stem = bindings_stem(&self.output);

        fs::write(&self.output, schema)?;
        println!("Compiled {} → {}", self.source.display(), self.output.display());

        if !compilation.bindings.is_empty() {
            fs::create_dir_all(&self.out_dir)?;
        }
        for (target, code) in &compilation.bindings {
            let path = self.out_dir.join(format!("{}.{}", stem, target.file_extension()));
            fs::write(&path, code)?;
            println!("Generated {} bindings → {}", target, path.display());
        }
        Ok(compilation)
    }

    fn watch(&self) -> Result<(), SdlError> {
        let mut seen = match self.run() {
            Ok(compilation) => snapshot(&compilation.modules),
            Err(e) => {
                eprintln!("error: {}", e);
                snapshot(&[self.source.clone()])
            }
        };
        info!(modules = seen.len(), "watching for changes");
        loop {
            thread::sleep(WATCH_INTERVAL);
            let current = snapshot(&seen.keys().cloned().collect::<Vec<_>>());
            if current == seen {
                continue;
            }
            info!("source changed, recompiling");
            seen = match self.run() {
                Ok(compilation) => snapshot(&compilation.modules),
                Err(e) => {
                    eprintln!("error: {}", e);
                    current
                }
            };
        }
    }
}

/// Modification times of `paths`; missing files map to `None`.
fn snapshot(paths: &[PathBuf]) -> HashMap<PathBuf, Option<SystemTime>> {
    paths
        .iter()
        .map(|p| {
            let modified = fs::metadata(p).and_then(|m| m.modified()).ok();
            (p.clone(), modified)
        })
        .collect()
}

fn run(cli: Cli) -> Result<ExitCode, SdlError> {
    match cli.command {
        Commands::Compile {
            source,
            output,
            targets,
            out_dir,
            root,
            baseline,
            watch,
            config,
        } => {
            let mut config = load_config(config.as_deref(), root)?;
            for name in &targets {
                let target: Target = name.parse()?;
                if !config.targets.contains(&target) {
                    config.targets.push(target);
                }
            }
            let output = output.unwrap_or_else(|| default_output(&source));
            let out_dir = out_dir.unwrap_or_else(|| {
                output.parent().map(Path::to_path_buf).unwrap_or_default()
            });
            let job = CompileJob {
                source,
                output,
                out_dir,
                baseline,
                compiler: Compiler::new(config),
            };
            if watch {
                job.watch()?;
            } else {
                job.run()?;
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Check { source, root } => {
            let compiler = Compiler::new(load_config(None, root)?);
            compiler.compile_file(&source)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Inspect { source, root } => {
            let compiler = Compiler::new(load_config(None, root)?);
            let compilation = compiler.compile_file(&source)?;
            let json = serde_json::to_string_pretty(&compilation.registry)
                .map_err(|e| SdlError::Internal(e.to_string()))?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate { schema, instance } => {
            let schema = fs::read_to_string(&schema)?;
            let instance = fs::read_to_string(&instance)?;
            let violations = validate_json(&schema, &instance)?;
            if violations.is_empty() {
                println!("valid");
                return Ok(ExitCode::SUCCESS);
            }
            for violation in &violations {
                println!("{}", violation);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_stem() {
        assert_eq!(bindings_stem(Path::new("out/agent.schema.json")), "agent");
        assert_eq!(bindings_stem(Path::new("out.json")), "out");
        assert_eq!(bindings_stem(Path::new("schema")), "schema");
    }

    #[test]
    fn test_default_output_sits_next_to_source() {
        assert_eq!(
            default_output(Path::new("defs/agent.sdl")),
            PathBuf::from("defs/agent.schema.json")
        );
    }
}
