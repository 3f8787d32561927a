use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use lumi_capture::{parser, recorder, report, utils, Synthesizer};

#[derive(Parser)]
#[command(name = "lumi-capture")]
#[command(author = "NL Team")]
#[command(version = "0.1.0")]
#[command(about = "Browser interaction capture and locator synthesis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a locator for the first element a selector matches
    Locate {
        /// Path to an HTML document snapshot
        document: PathBuf,

        /// CSS selector or XPath picking the element
        selector: String,

        /// Use the drag-oriented locator variant
        #[arg(long, default_value = "false")]
        drag: bool,

        /// Capture config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Replay a scripted event stream and print the resulting ledger
    Replay {
        /// Path to the initial HTML document snapshot
        document: PathBuf,

        /// Path to the replay script (YAML)
        script: PathBuf,

        /// Capture config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (json, steps)
        #[arg(short, long, default_value = "steps")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a saved JSON ledger export
    Report {
        /// Path to the ledger export JSON
        export: PathBuf,

        /// Output format (json, steps)
        #[arg(short, long, default_value = "steps")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<utils::CaptureConfig> {
    let config = match path {
        Some(path) => utils::CaptureConfig::load(path)?,
        None => utils::CaptureConfig::default().with_env_overrides()?,
    };
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Locate {
            document,
            selector,
            drag,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let doc = parser::load_document(&document)?;
            let node = doc
                .find(&selector)
                .with_context(|| format!("Invalid selector: {}", selector))?
                .with_context(|| format!("Selector matched nothing: {}", selector))?;

            let synth = Synthesizer::new(&doc, &config.synthesizer);
            let locator = if drag {
                synth.synthesize_for_drag(node)
            } else {
                synth.synthesize(node)
            };

            let confidence = if locator.is_weak() {
                "weak".yellow()
            } else {
                "stable".green()
            };
            println!("{} {}", "🎯".to_string().blue(), locator.value.cyan().bold());
            println!("  Kind: {}", locator.kind.as_str());
            println!("  Strategy: {}", locator.strategy.as_str());
            println!("  Confidence: {}", confidence);
        }
        Commands::Replay {
            document,
            script,
            config,
            format,
            output,
        } => {
            println!(
                "{} Replaying {} against {}",
                "▶".green().bold(),
                script.display(),
                document.display()
            );

            let config = load_config(config.as_deref())?;
            let doc = parser::load_document(&document)?;
            let replay_script = parser::parse_script_file(&script)?;
            let base_dir = script.parent().unwrap_or_else(|| Path::new("."));

            let mut session = recorder::replay(doc, &replay_script, base_dir, config)?;

            let mut export = report::LedgerExport::new(session.ledger(), replay_script.name.clone());
            export.file_transfers = session.drain_file_transfers();
            println!(
                "  Recorded: {}",
                format!("{} step(s)", export.total_steps).cyan()
            );

            report::write_report(&export, &format, output.as_deref())?;
        }
        Commands::Report {
            export,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                export.display()
            );
            report::generate_report(&export, &format, output.as_deref())?;
        }
    }

    Ok(())
}
