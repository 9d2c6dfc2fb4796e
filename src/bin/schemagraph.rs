//! schemagraph CLI
//!
//! Command-line interface for checking schemas and validating instances.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use schemagraph::{
    is_url, load_schema, load_schema_auto, CompileOptions, LocalLoader, SchemaError, Validator,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "schemagraph")]
#[command(about = "Compile Draft 2019-09 JSON Schemas and validate instances against them")]
#[command(version)]
struct Cli {
    /// Local directory containing schema files
    #[arg(long, global = true, requires = "schema_remote_base")]
    schema_local_base: Option<PathBuf>,

    /// URL prefix mapped onto --schema-local-base (e.g., https://example.com/schemas)
    #[arg(long, global = true, requires = "schema_local_base")]
    schema_remote_base: Option<String>,

    /// Log compilation progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema and report whether it is valid
    Check {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,
    },

    /// Validate instance files against a schema
    Validate {
        /// Schema source: file path or URL (http:// or https://)
        schema: String,

        /// Instance files to validate
        #[arg(required = true)]
        instances: Vec<PathBuf>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Skip the meta-schema check
        #[arg(long)]
        no_meta: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = compile_options(
        cli.schema_local_base.as_deref(),
        cli.schema_remote_base.as_deref(),
    );

    let result = match cli.command {
        Commands::Check { schema } => run_check(&schema, options),
        Commands::Validate {
            schema,
            instances,
            json,
            no_meta,
        } => run_validate(&schema, &instances, options.validate_schema(!no_meta), json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn compile_options(local_base: Option<&Path>, remote_base: Option<&str>) -> CompileOptions {
    match (local_base, remote_base) {
        (Some(local), Some(remote)) => {
            CompileOptions::new().with_loader(Box::new(LocalLoader::new(remote, local)))
        }
        _ => CompileOptions::new(),
    }
}

/// Base URI for a schema without `$id`: its URL, or the file's `file://` URI
/// so relative references find sibling files.
fn source_base_uri(source: &str) -> Option<String> {
    if is_url(source) {
        return Some(source.to_string());
    }
    let path = std::fs::canonicalize(source).ok()?;
    Url::from_file_path(path).ok().map(String::from)
}

fn compile(source: &str, options: CompileOptions) -> Result<Validator, (String, u8)> {
    let schema = load_schema_auto(source)
        .map_err(|e| (format!("loading schema: {}", e), e.exit_code() as u8))?;
    let options = match source_base_uri(source) {
        Some(base) => options.with_base_uri(&base),
        None => options,
    };
    options
        .build(&schema)
        .map_err(|e| (describe_schema_error(&e), e.exit_code() as u8))
}

fn describe_schema_error(error: &SchemaError) -> String {
    match error {
        SchemaError::InvalidAgainstMetaSchema { errors } => {
            let details: Vec<String> = errors.iter().map(|e| format!("  {}", e)).collect();
            format!("{}\n{}", error, details.join("\n"))
        }
        _ => error.to_string(),
    }
}

fn run_check(source: &str, options: CompileOptions) -> Result<(), u8> {
    match compile(source, options) {
        Ok(_) => {
            println!("{}: ok", source);
            Ok(())
        }
        Err((message, code)) => {
            eprintln!("Error: {}", message);
            Err(code)
        }
    }
}

fn run_validate(
    source: &str,
    instances: &[PathBuf],
    options: CompileOptions,
    json_output: bool,
) -> Result<(), u8> {
    let validator = compile(source, options).map_err(|(message, code)| {
        report_error(json_output, &message);
        code
    })?;

    let mut exit = 0u8;
    let mut reports = Vec::new();
    for path in instances {
        let instance = match load_schema(path) {
            Ok(instance) => instance,
            Err(e) => {
                let code = e.exit_code() as u8;
                exit = exit.max(code);
                if json_output {
                    reports.push(json!({
                        "instance": path.display().to_string(),
                        "error": e.to_string(),
                    }));
                } else {
                    eprintln!("Error: loading {}: {}", path.display(), e);
                }
                continue;
            }
        };

        let result = validator.validate(&instance);
        if !result.ok {
            exit = exit.max(1);
        }
        if json_output {
            reports.push(json!({
                "instance": path.display().to_string(),
                "valid": result.ok,
                "errors": result.errors(),
            }));
        } else if result.ok {
            println!("{}: valid", path.display());
        } else {
            eprintln!("{}: invalid", path.display());
            for error in result.errors() {
                eprintln!("  {}", error);
            }
        }
    }

    if json_output {
        println!("{}", json!({ "results": reports }));
    }

    if exit == 0 {
        Ok(())
    } else {
        Err(exit)
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
