//! Triad CLI - Command line interface for the triad agent pipeline
//!
//! A Product Manager, a Developer and an Architect agent take one
//! requirement from a Jira issue to a reviewed, unmerged pull request.

mod commands;
mod ui;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{RunArgs, RunExit, SetupArgs, EXIT_INTERRUPTED};
use triad_core::{Config, CredentialStore};

/// Triad: PM, Developer and Architect agents for one requirement
#[derive(Parser, Debug)]
#[command(name = "triad")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a requirement through the pipeline
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Configure and verify credentials
    Setup(SetupArgs),

    /// Show current configuration
    Config,

    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn show_config() -> anyhow::Result<()> {
    let config = Config::load_with_overrides(None, None)?;

    println!("Triad Configuration");
    println!("===================");
    println!();
    println!("Models:");
    println!("  pm: {}", config.models.pm);
    println!("  developer: {}", config.models.developer);
    println!("  architect: {}", config.models.architect);
    println!("  base_url: {}", config.models.base_url);
    println!("  timeout: {}s", config.models.timeout.as_secs());
    println!();
    println!("Pipeline:");
    println!("  max_rounds: {}", config.pipeline.max_rounds);
    println!();
    println!("Budgets (messages per phase):");
    println!("  pm: {}", config.budgets.pm);
    println!("  developer: {}", config.budgets.developer);
    println!("  review: {}", config.budgets.review);
    println!("  fix: {}", config.budgets.fix);
    println!();

    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }

    let store = CredentialStore::open_default()?;
    println!("Credentials file: {}", store.path().display());
    match store.load() {
        Ok(creds) => {
            let missing = creds.missing();
            if missing.is_empty() {
                println!("  (complete)");
            } else {
                println!("  missing: {}", missing.join(", "));
            }
        }
        Err(e) => println!("  (unreadable: {})", e),
    }

    Ok(())
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Some(Commands::Run(args)) => match args.execute(cli.verbose).await? {
            RunExit::Finished(outcome) if outcome.needs_follow_up() => {
                println!(
                    "  {} Review rounds exhausted without approval; manual follow-up needed",
                    style("⚠").yellow()
                );
                Ok(ExitCode::SUCCESS)
            }
            RunExit::Finished(_) => Ok(ExitCode::SUCCESS),
            RunExit::Interrupted => Ok(ExitCode::from(EXIT_INTERRUPTED)),
        },
        Some(Commands::Setup(args)) => {
            args.execute().await?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Config) => {
            show_config()?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Version) => {
            println!("triad {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("Triad - PM, Developer and Architect agents for one requirement");
            println!();
            println!("Use --help for usage information");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Heading for a failed command; a fatal pipeline error aborts the run
fn failure_heading(e: &anyhow::Error) -> &'static str {
    match e.downcast_ref::<triad_core::Error>() {
        Some(err) if err.is_fatal() => "Pipeline aborted:",
        _ => "Error:",
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style(failure_heading(&e)).red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
