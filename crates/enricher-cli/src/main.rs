//! enricher - resumable scholar profile enrichment
//!
//! Resolves entity records to profile links, then fetches profile details,
//! checkpointing every result to CSV so interrupted runs resume.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use enricher_core::ProgressContext;

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "enricher")]
#[command(about = "Resumable scholar profile enrichment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./enricher.toml or ~/.config/enricher/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one phase: resolve (alias: initial) or details
    Run(cmd::run::RunArgs),
    /// Show checkpoint row counts per phase
    Status,
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = ProgressContext::new();

    let loaded = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    };

    // Logging level comes from the config, so it is initialised after loading
    let level = loaded
        .as_ref()
        .map_or("info", |config| config.logging.level.as_str());
    let multi = progress.is_tty().then(|| progress.multi());
    if let Err(e) = enricher_core::init_logging(level, cli.debug, multi) {
        eprintln!("Cannot initialise logging: {e}");
    }

    let result = loaded.and_then(|config| {
        match &config.source {
            Some(path) => log::info!("Loaded config from {}", path.display()),
            None => log::debug!("No config file found, using defaults"),
        }
        dispatch(cli.command, &config, &progress)
    });
    exit_code(result)
}

/// 0 once a command has reported (including interrupted runs); 1 on load or
/// config errors.
fn exit_code(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Command, config: &Config, progress: &ProgressContext) -> Result<()> {
    match command {
        Command::Run(args) => cmd::run::run(args, config, progress),
        Command::Status => cmd::status::run(config),
        Command::Config => {
            config.validate()?;
            print_config(config);
            Ok(())
        }
    }
}

fn print_config(config: &Config) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    let source = config
        .source
        .as_ref()
        .map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string());
    table.add_row(vec!["Config file", &source]);
    table.add_row(vec!["Input", &config.files.input.display().to_string()]);
    table.add_row(vec![
        "Resolve output",
        &config.files.output_resolve.display().to_string(),
    ]);
    table.add_row(vec![
        "Details output",
        &config.files.output_details.display().to_string(),
    ]);
    table.add_row(vec![
        "Error log",
        &config.files.error_log.display().to_string(),
    ]);
    table.add_row(vec![
        "Columns",
        &format!(
            "id={}, name={}, organization={}",
            config.columns.id, config.columns.name, config.columns.organization
        ),
    ]);
    table.add_row(vec!["Workers", &config.search.max_workers.to_string()]);
    table.add_row(vec![
        "Timeouts",
        &format!(
            "{}s per fetch, {}s connect",
            config.search.timeout_secs, config.search.connect_timeout_secs
        ),
    ]);
    table.add_row(vec!["Search URL", &config.search.search_url]);
    table.add_row(vec!["Site filter", &config.search.site_filter]);
    table.add_row(vec!["User agent", &config.search.user_agent]);
    table.add_row(vec!["Encodings", &config.input.encodings.join(", ")]);
    table.add_row(vec!["Log level", &config.logging.level]);

    println!("{table}");
}
