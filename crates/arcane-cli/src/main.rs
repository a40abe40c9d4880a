use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use arcane::{Level, Preferences, Program, snapshot};
use clap::Parser;

#[derive(Parser)]
#[command(name = "arcane")]
#[command(about = "Interprets a lexed and parsed program")]
struct Cli {
    /// Program JSON: `{ "tokens": [...], "tree": {...} }`
    input: PathBuf,

    /// Preferences JSON file
    #[arg(long)]
    preferences: Option<PathBuf>,

    /// Maximum number of nested function calls
    #[arg(long)]
    call_stack_size: Option<usize>,

    /// Highest recorded report level (0 info, 1 warning, 2 error)
    #[arg(long)]
    report_level: Option<u8>,

    /// Filter call overloads by structural type acceptance
    #[arg(long)]
    type_checking: bool,

    /// Source text used to render located reports
    #[arg(long)]
    source: Option<PathBuf>,

    /// Store snapshot seeding the run
    #[arg(long)]
    snapshot_in: Option<PathBuf>,

    /// Write the resulting store snapshot to this file
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Log interpreter activity at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_module("arcane", log::LevelFilter::Debug);
    }
    logger.init();

    let mut preferences = match &cli.preferences {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&json).with_context(|| format!("Invalid preferences in {}", path.display()))?
        }
        None => Preferences::default(),
    };
    if let Some(size) = cli.call_stack_size {
        preferences.call_stack_size = size;
    }
    if let Some(level) = cli.report_level {
        preferences.allowed_report_level = Level::from(level);
    }
    if cli.type_checking {
        preferences.structural_type_checking = true;
    }

    let json = fs::read_to_string(&cli.input).with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let program = Program::from_json(&json).with_context(|| format!("Invalid program in {}", cli.input.display()))?;

    let seed = match &cli.snapshot_in {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            Some(snapshot::restore(&json).with_context(|| format!("Invalid snapshot in {}", path.display()))?)
        }
        None => None,
    };

    let interpretation = program.interpret(seed, preferences);

    let source = match &cli.source {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
            Some((name, text))
        }
        None => None,
    };
    for report in &interpretation.reports {
        match (&source, report.level) {
            (_, Level::Info) => println!("{}", report.string),
            (Some((name, text)), _) => eprint!("{}", report.render(name, text)),
            (None, level) => {
                let location = report.location.map(|location| format!("{location}: ")).unwrap_or_default();
                eprintln!("[{level:?}] {location}{}", report.string);
            }
        }
    }

    if let Some(path) = &cli.snapshot_out {
        let json = snapshot::save(&interpretation.composites).context("Failed to save snapshot")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Saved {} composites to {}", interpretation.composites.live_count(), path.display());
    }

    Ok(())
}
