//! # morph-cli
//!
//! Command-line interface for the datamorph engine: run a schema-driven
//! transform over an input file, or inspect a compiled schema's record
//! hierarchy.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use morph_engine::{CompiledRecord, Ctx, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliExitCode {
    Success = 0,
    Warnings = 1,
    Errors = 2,
}

impl CliExitCode {
    fn as_exit_code(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

#[derive(Parser)]
#[command(name = "morph")]
#[command(about = "Schema-driven ingestion and transformation engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform an input file, one JSON record per line
    Transform {
        /// Input file path
        input: String,

        /// Schema file path
        #[arg(short, long)]
        schema: String,

        /// Output file path (writes to stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Context values visible to `external` declarations, as KEY=VALUE
        #[arg(short = 'c', long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// Skip records that fail with a continuable error instead of
        /// stopping
        #[arg(long)]
        skip_bad_records: bool,
    },

    /// Compile a schema and print its record hierarchy
    Inspect {
        /// Schema file path
        #[arg(short, long)]
        schema: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run() {
        Ok(code) => code.as_exit_code(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            CliExitCode::Errors.as_exit_code()
        }
    }
}

fn run() -> anyhow::Result<CliExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Transform {
            input,
            schema,
            output,
            context,
            skip_bad_records,
        } => run_transform(&input, &schema, output.as_deref(), &context, skip_bad_records),
        Commands::Inspect { schema } => run_inspect(&schema),
    }
}

fn load_schema(path: &str) -> anyhow::Result<Schema> {
    let content = std::fs::read(path).with_context(|| format!("cannot read schema '{path}'"))?;
    let name = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string());
    Schema::new(name, &content).with_context(|| format!("cannot compile schema '{path}'"))
}

fn parse_context(pairs: &[String]) -> anyhow::Result<Ctx> {
    let mut ctx = Ctx::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("context value '{pair}' is not KEY=VALUE");
        };
        ctx.set(key, value);
    }
    Ok(ctx)
}

fn run_transform(
    input_path: &str,
    schema_path: &str,
    output_path: Option<&str>,
    context: &[String],
    skip_bad_records: bool,
) -> anyhow::Result<CliExitCode> {
    let schema = load_schema(schema_path)?;
    let ctx = parse_context(context)?;
    let input =
        File::open(input_path).with_context(|| format!("cannot open input '{input_path}'"))?;

    let mut writer: BufWriter<Box<dyn Write>> = match output_path {
        Some(path) => BufWriter::new(Box::new(
            File::create(path).with_context(|| format!("cannot create output '{path}'"))?,
        )),
        None => BufWriter::new(Box::new(io::stdout())),
    };

    let mut transform = schema.new_transform(input_path, input, ctx)?;
    let mut written = 0usize;
    let mut skipped = 0usize;
    loop {
        match transform.read() {
            Ok(Some((_, bytes))) => {
                writer.write_all(&bytes)?;
                writer.write_all(b"\n")?;
                written += 1;
            }
            Ok(None) => break,
            Err(e) if skip_bad_records && transform.is_continuable(&e) => {
                tracing::warn!(error = %transform.format_error(&e), "skipping record");
                skipped += 1;
            }
            Err(e) => bail!("{}", transform.format_error(&e)),
        }
    }
    writer.flush()?;

    tracing::info!(written, skipped, "transform finished");
    if skipped > 0 {
        Ok(CliExitCode::Warnings)
    } else {
        Ok(CliExitCode::Success)
    }
}

fn run_inspect(schema_path: &str) -> anyhow::Result<CliExitCode> {
    let schema = load_schema(schema_path)?;
    println!("schema: {} ({:?})", schema.name(), schema.format());
    println!("target: {:?}", schema.target_path());
    for record in schema.records() {
        print_record(record, 1);
    }
    Ok(CliExitCode::Success)
}

fn print_record(record: &CompiledRecord, indent: usize) {
    let max = record
        .max
        .map(|m| m.to_string())
        .unwrap_or_else(|| "*".to_string());
    let target = if record.is_target { " [target]" } else { "" };
    println!(
        "{}{} min={} max={}{}",
        "  ".repeat(indent),
        record.name,
        record.min,
        max,
        target
    );
    for child in &record.children {
        print_record(child, indent + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    const SCHEMA: &str = r#"{
        "parser_settings": {"version": "omni.2.1", "file_format_type": "delimited"},
        "file_declaration": {
            "delimiter": ",",
            "header_row": true,
            "records": [{"name": "row", "min": 0, "max": -1, "is_target": true}]
        },
        "transform_declarations": {
            "FINAL_OUTPUT": {"object": {"who": {"xpath": "name"}}}
        }
    }"#;

    fn temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_transform_writes_one_json_per_line() {
        let schema = temp_file(SCHEMA);
        let input = temp_file("name,age\nJohn,30\nJane,25\n");
        let output = NamedTempFile::new().unwrap();

        let code = run_transform(
            input.path().to_str().unwrap(),
            schema.path().to_str().unwrap(),
            Some(output.path().to_str().unwrap()),
            &[],
            false,
        )
        .unwrap();
        assert_eq!(code, CliExitCode::Success);

        let written = std::fs::read_to_string(output.path()).unwrap();
        assert_eq!(written, "{\"who\":\"John\"}\n{\"who\":\"Jane\"}\n");
    }

    #[test]
    fn test_context_pairs() {
        let ctx = parse_context(&["user=al".to_string(), "env=prod".to_string()]).unwrap();
        assert_eq!(ctx.external("user").and_then(|v| v.as_str()), Some("al"));
        assert_eq!(ctx.external("env").and_then(|v| v.as_str()), Some("prod"));
        assert!(parse_context(&["nonsense".to_string()]).is_err());
    }

    #[test]
    fn test_missing_schema_file() {
        let err = load_schema("/nonexistent/schema.json").unwrap_err();
        assert!(err.to_string().contains("cannot read schema"));
    }

    #[test]
    fn test_inspect_compiles() {
        let schema = temp_file(SCHEMA);
        let code = run_inspect(schema.path().to_str().unwrap()).unwrap();
        assert_eq!(code, CliExitCode::Success);
    }
}
