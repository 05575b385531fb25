// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typekeep — font-fidelity PDF text editing
//
// Entry point. Initialises logging, loads the engine configuration from the
// data directory, and dispatches the subcommand.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};

use typekeep_core::human_errors::humanize_error;
use typekeep_core::{
    Alignment, AuditEntry, Cardinality, EditRequest, EngineConfig, EnginePreference, OperationId,
    Overrides, Result, Selector, TypekeepError,
};
use typekeep_document::PdfDocument;
use typekeep_engine::{EngineManager, data_dir};

#[derive(Parser)]
#[command(name = "typekeep")]
#[command(version)]
#[command(about = "Replace text in PDFs without losing the original font")]
struct Cli {
    /// Directory holding config.json, backups and the audit database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace text in a PDF
    Edit(EditArgs),

    /// List the text runs of a PDF as JSON
    Runs {
        input: PathBuf,

        /// Only this 0-based page
        #[arg(long)]
        page: Option<u32>,
    },

    /// List the fonts a PDF draws text with and how faithfully each can
    /// be redrawn
    Fonts {
        input: PathBuf,

        /// Exit with an error if any font would block a strict edit
        #[arg(long)]
        strict: bool,
    },

    /// Inspect the audit log
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },

    /// Re-run a recorded edit against a PDF
    Replay {
        operation: OperationId,
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write out the input snapshot of a recorded edit
    Restore {
        operation: OperationId,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to config.json in the data directory
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand)]
enum AuditCommand {
    /// Print the most recent entries, newest first
    Recent {
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Write every entry to a JSON Lines file
    Export { path: PathBuf },
}

#[derive(Args)]
struct EditArgs {
    input: PathBuf,

    #[arg(short, long)]
    output: PathBuf,

    /// Text to search for
    #[arg(long, conflicts_with = "id", required_unless_present = "id")]
    search: Option<String>,

    /// Exact run id (see `typekeep runs`)
    #[arg(long)]
    id: Option<String>,

    /// Replacement text
    #[arg(long = "replace")]
    replacement: String,

    /// Replace every matching run instead of the first
    #[arg(long, conflicts_with = "id")]
    all: bool,

    /// Restrict the search to this 0-based page
    #[arg(long, conflicts_with = "id")]
    page: Option<u32>,

    #[arg(long, value_enum, default_value_t = EngineArg::Auto)]
    engine: EngineArg,

    /// Succeed with no outcomes when nothing matches
    #[arg(long)]
    allow_empty: bool,

    /// Reject runs whose font cannot be redrawn exactly
    #[arg(long)]
    strict: bool,

    #[command(flatten)]
    overrides: OverrideArgs,
}

#[derive(Args)]
struct OverrideArgs {
    #[arg(long)]
    font: Option<String>,
    #[arg(long)]
    size: Option<f32>,
    /// Fill colour as #rrggbb
    #[arg(long)]
    color: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    x: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    y: Option<f32>,
    /// Rotation in degrees, counter-clockwise
    #[arg(long, allow_negative_numbers = true)]
    rotation: Option<f32>,
    #[arg(long, value_enum)]
    align: Option<AlignArg>,
    /// Centre the new text in the original box with spaces
    #[arg(long)]
    padding: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    Auto,
    ForceDirect,
    ForcePreserving,
}

impl From<EngineArg> for EnginePreference {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Auto => Self::Auto,
            EngineArg::ForceDirect => Self::ForceDirect,
            EngineArg::ForcePreserving => Self::ForcePreserving,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AlignArg {
    Left,
    Center,
    Right,
    Justify,
}

impl From<AlignArg> for Alignment {
    fn from(arg: AlignArg) -> Self {
        match arg {
            AlignArg::Left => Self::Left,
            AlignArg::Center => Self::Center,
            AlignArg::Right => Self::Right,
            AlignArg::Justify => Self::Justify,
        }
    }
}

impl EditArgs {
    fn request(&self) -> EditRequest {
        let selector = match (&self.id, &self.search) {
            (Some(id), _) => Selector::Id { id: id.clone() },
            (None, search) => Selector::Content {
                page: self.page,
                text: search.clone().unwrap_or_default(),
                cardinality: if self.all {
                    Cardinality::All
                } else {
                    Cardinality::First
                },
            },
        };
        let o = &self.overrides;
        EditRequest {
            selector,
            replacement: self.replacement.clone(),
            overrides: Overrides {
                font_name: o.font.clone(),
                font_size: o.size,
                color: o.color.clone(),
                x: o.x,
                y: o.y,
                rotation: o.rotation,
                align: o.align.map(Alignment::from),
                padding: o.padding.then_some(true),
            },
            engine: self.engine.into(),
            allow_empty: self.allow_empty,
            strict: self.strict,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let human = humanize_error(&err);
            eprintln!("error: {err}");
            eprintln!("{}", human.as_note());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let dir = cli.data_dir.unwrap_or_else(data_dir::data_dir);
    std::fs::create_dir_all(&dir)?;
    let stored = EngineConfig::load(&dir);
    let config = stored.clone().resolved(&dir);
    tracing::debug!(data_dir = %dir.display(), "configuration loaded");

    match cli.command {
        Commands::Edit(args) => {
            let engine = EngineManager::open(config)?;
            let mut doc = PdfDocument::open(&args.input)?;
            let report = engine.run(&mut doc, &args.request())?;
            doc.save(&args.output)?;
            print_json(&report)
        }
        Commands::Runs { input, page } => {
            let engine = EngineManager::open(config)?;
            let doc = PdfDocument::open(&input)?;
            let runs: Vec<_> = engine
                .text_runs(&doc)?
                .into_iter()
                .filter(|run| page.is_none_or(|p| run.page == p))
                .collect();
            print_json(&runs)
        }
        Commands::Fonts { input, strict } => {
            let engine = EngineManager::open(config)?;
            let doc = PdfDocument::open(&input)?;
            let report = engine.font_report(&doc)?;
            print_json(&report)?;
            if report.blocks(strict) {
                return Err(TypekeepError::validation(
                    "some fonts cannot be redrawn exactly; strict edits would be rejected",
                ));
            }
            Ok(())
        }
        Commands::Audit { command } => {
            let engine = EngineManager::open(config)?;
            let log = engine.audit_log()?;
            match command {
                AuditCommand::Recent { limit } => print_json(&log.recent_entries(limit)?),
                AuditCommand::Export { path } => {
                    let written = log.export_jsonl(&path)?;
                    tracing::info!(entries = written, path = %path.display(), "audit log exported");
                    Ok(())
                }
            }
        }
        Commands::Replay {
            operation,
            input,
            output,
        } => {
            let engine = EngineManager::open(config)?;
            let entry = recorded(&engine, &operation)?;
            let mut doc = PdfDocument::open(&input)?;
            let report = engine.replay(&entry, &mut doc)?;
            doc.save(&output)?;
            print_json(&report)
        }
        Commands::Config { write } => {
            if write {
                stored.persist(&dir)?;
                tracing::info!(path = %dir.join("config.json").display(), "configuration written");
            }
            print_json(&config)
        }
        Commands::Restore { operation, output } => {
            let engine = EngineManager::open(config)?;
            let entry = recorded(&engine, &operation)?;
            let mut doc = engine.restore(&entry)?;
            save_new(&mut doc, &output)
        }
    }
}

fn recorded(engine: &EngineManager, operation: &OperationId) -> Result<AuditEntry> {
    engine
        .audit_log()?
        .entry(operation)?
        .ok_or_else(|| TypekeepError::validation(format!("no audit entry for operation {operation}")))
}

/// Save to `path`, refusing to replace an existing file.
fn save_new(doc: &mut PdfDocument, path: &Path) -> Result<()> {
    if path.exists() {
        return Err(TypekeepError::validation(format!(
            "{} already exists",
            path.display()
        )));
    }
    doc.save(path)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
