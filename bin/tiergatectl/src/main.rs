//! ---
//! tg_section: "05-operator-interfaces"
//! tg_subsection: "binary"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Operator CLI for inspecting policy bundles and access decisions."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tiergate_common::init_tracing;
use tiergate_logging as logging;

mod inspect;

#[derive(Debug, Parser)]
#[command(author, version, about = "Tiergate policy inspection utility", long_about = None)]
struct Cli {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(long, value_name = "FILE", env = "TIERGATE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Policy bundle (TOML or YAML); overrides `bundle` from the configuration.
    #[arg(long, value_name = "FILE", global = true)]
    bundle: Option<PathBuf>,

    /// Also write JSON logs to the rolling file configured under `[logging]`.
    #[arg(long, global = true)]
    log_files: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load the bundle, build the hierarchy and report dangling grants.
    Validate,
    /// Evaluate one or more capability paths or prefixes for a principal.
    Check(inspect::CheckCommand),
    /// Print the widest data scope a principal holds for an action.
    Scope(inspect::ScopeCommand),
    /// Print the navigation tree a principal can reach.
    Menu(inspect::MenuCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let source = inspect::Source {
        config: cli.config,
        bundle: cli.bundle,
    };
    if cli.log_files {
        let config = source.app_config()?;
        init_tracing("tiergatectl", &config.logging)?;
    } else {
        logging::init();
    }
    let output = match cli.command {
        Commands::Validate => inspect::validate(&source, cli.format)?,
        Commands::Check(cmd) => cmd.execute(&source, cli.format)?,
        Commands::Scope(cmd) => cmd.execute(&source, cli.format)?,
        Commands::Menu(cmd) => cmd.execute(&source, cli.format)?,
    };
    println!("{output}");
    Ok(())
}
