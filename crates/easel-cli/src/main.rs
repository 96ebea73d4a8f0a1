//! `easel`: normalize and import SVG files, decompose paths and inspect
//! saved documents from the command line.

use clap::{Parser, Subcommand};
use easel_core::{Compatibility, Document, DocumentError, EngineConfig, EngineContext, ObjectId};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] easel_core::ConfigError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("Nothing to decompose in {0}")]
    NothingToDecompose(ObjectId),
}

#[derive(Parser, Debug)]
#[command(name = "easel", version, about = "Repair SVGs and edit Easel documents")]
struct Cli {
    /// Engine configuration (JSON).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the result here instead of stdout.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Repair an SVG and print the result.
    Normalize { input: PathBuf },
    /// Import an SVG into a new document.
    Import { input: PathBuf },
    /// Split a compound path or dissolve a group.
    Decompose { input: PathBuf, object: ObjectId },
    /// Write a document as SVG.
    Export { input: PathBuf },
    /// Summarize a document.
    Info { input: PathBuf },
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_output(output: Option<&Path>, contents: &str) -> Result<(), CliError> {
    match output {
        Some(path) => std::fs::write(path, contents).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

fn load_context(config: EngineConfig, path: &Path) -> Result<EngineContext, CliError> {
    let mut context = EngineContext::new(config);
    context.load_json(&read(path)?)?;
    Ok(context)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let output = cli.output.as_deref();

    match cli.command {
        Command::Normalize { input } => {
            let context = EngineContext::new(config);
            let result = context.pipeline().normalize(&read(&input)?);
            eprintln!("{}: {:?}", input.display(), result.compatibility);
            write_output(output, &result.normalized_markup)
        }
        Command::Import { input } => {
            let mut context = EngineContext::new(config);
            let (outcome, result) = context.import_svg(&read(&input)?);
            eprintln!(
                "{}: {:?}, {} object(s) added",
                input.display(),
                result.compatibility,
                outcome.count
            );
            if result.compatibility == Compatibility::Error {
                log::warn!("{} was replaced by a placeholder", input.display());
            }
            write_output(output, &context.document().to_json_pretty()?)
        }
        Command::Decompose { input, object: id } => {
            let mut context = load_context(config, &input)?;
            if context.document().get(id).is_none() {
                return Err(DocumentError::NotFound(id).into());
            }
            context.select(&[id]);
            let outcome = context.decompose_selected();
            if !outcome.success {
                return Err(CliError::NothingToDecompose(id));
            }
            eprintln!("{} object(s) created", outcome.count);
            for id in &outcome.selection {
                eprintln!("  {id}");
            }
            write_output(output, &context.document().to_json_pretty()?)
        }
        Command::Export { input } => {
            let document = Document::from_json(&read(&input)?)?;
            write_output(output, &document.to_svg())
        }
        Command::Info { input } => {
            let document = Document::from_json(&read(&input)?)?;
            write_output(output, &describe(&document))
        }
    }
}

fn describe(document: &Document) -> String {
    let mut lines = vec![
        format!("document {} {:?}", document.id, document.name),
        format!(
            "workspace {} x {}",
            document.workspace_width, document.workspace_height
        ),
        format!("{} object(s)", document.len()),
    ];
    for object in document.content() {
        let bounds = object.bounds();
        lines.push(format!(
            "  {} {:?} {} [{:.1}, {:.1}, {:.1}, {:.1}]",
            object.id(),
            object.kind(),
            object.name.as_deref().unwrap_or("-"),
            bounds.x0,
            bounds.y0,
            bounds.x1,
            bounds.y1
        ));
    }
    lines.join("\n")
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    log::debug!("{:?}", cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("easel: {e}");
            ExitCode::FAILURE
        }
    }
}
