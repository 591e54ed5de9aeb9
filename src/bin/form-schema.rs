//! Form Schema CLI
//!
//! Command-line interface for fetching and composing form schemas.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use form_schema::{
    check_composite, compose_identifiers, parse_identifiers, render_corpus, render_outcome,
    ComposeOutcome, DirectorySource, FallbackFormat, InputError, InputFraming, SchemaFetcher,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "form-schema")]
#[command(about = "Fetch, order and merge form JSON Schemas")]
#[command(version)]
struct Cli {
    /// Log progress to stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the schemas for the given identifiers into one composite schema
    Compose {
        #[command(flatten)]
        source: SourceArgs,

        /// Output on merge conflict: array (JSON array) or concat (comma-joined objects)
        #[arg(long, default_value = "array")]
        fallback: String,

        /// Exit with an error instead of returning unmerged documents on conflict
        #[arg(long)]
        fail_on_conflict: bool,

        /// Check that the composite compiles as a JSON Schema
        #[arg(long)]
        check: bool,
    },

    /// Print the ordered, dereferenced documents without merging them
    Fetch {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Identifiers of the schema records to combine
    identifiers: Vec<String>,

    /// Directory holding schema records
    #[arg(long, env = "FORM_SCHEMA_ROOT")]
    root: PathBuf,

    /// Read identifiers from a file ("-" for stdin) instead of arguments
    #[arg(long, conflicts_with = "identifiers")]
    input: Option<String>,

    /// Content type of --input: application/json or text/plain
    #[arg(long, default_value = "text/plain")]
    content_type: String,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Output file (stdout if not specified)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compose {
            source,
            fallback,
            fail_on_conflict,
            check,
        } => run_compose(&source, &fallback, fail_on_conflict, check),
        Commands::Fetch { source } => run_fetch(&source),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Send tracing output to stderr so stdout only ever carries JSON.
fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "form_schema=warn",
        1 => "form_schema=info",
        _ => "form_schema=debug",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_compose(
    args: &SourceArgs,
    fallback: &str,
    fail_on_conflict: bool,
    check: bool,
) -> Result<(), u8> {
    let fallback = FallbackFormat::parse(fallback).ok_or_else(|| {
        eprintln!(
            "Error: unknown fallback format \"{}\": expected array or concat",
            fallback
        );
        2u8
    })?;

    let identifiers = read_identifiers(args)?;
    let source = DirectorySource::new(&args.root);

    let outcome = compose_identifiers(&identifiers, &source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    match &outcome {
        ComposeOutcome::Composite(composite) if check => {
            check_composite(composite).map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
        }
        ComposeOutcome::Unmerged { conflict, .. } if fail_on_conflict => {
            eprintln!("Error: {}", conflict);
            return Err(conflict.exit_code() as u8);
        }
        _ => {}
    }

    let body = render_outcome(&outcome, fallback, args.pretty).map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    write_output(&body, args.output.as_ref())
}

fn run_fetch(args: &SourceArgs) -> Result<(), u8> {
    let identifiers = read_identifiers(args)?;
    let source = DirectorySource::new(&args.root);

    let corpus = SchemaFetcher::new(&source)
        .fetch(&identifiers)
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    let body = render_corpus(&corpus, FallbackFormat::JsonArray, args.pretty).map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    write_output(&body, args.output.as_ref())
}

/// Identifiers from `--input` (framed by `--content-type`) or from arguments.
fn read_identifiers(args: &SourceArgs) -> Result<Vec<String>, u8> {
    let report = |e: InputError| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    };

    let Some(input) = &args.input else {
        if args.identifiers.is_empty() {
            return Err(report(InputError::Empty));
        }
        return Ok(args.identifiers.clone());
    };

    let framing = InputFraming::from_content_type(&args.content_type).ok_or_else(|| {
        report(InputError::UnsupportedContentType {
            value: args.content_type.clone(),
        })
    })?;

    let body = if input == "-" {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body).map_err(|e| {
            eprintln!("Error reading stdin: {}", e);
            3u8
        })?;
        body
    } else {
        std::fs::read_to_string(input).map_err(|e| {
            eprintln!("Error reading {}: {}", input, e);
            3u8
        })?
    };

    parse_identifiers(&body, framing).map_err(report)
}

fn write_output(body: &str, output: Option<&PathBuf>) -> Result<(), u8> {
    match output {
        Some(path) => {
            std::fs::write(path, body).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", body);
        }
    }
    Ok(())
}
