mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "idcheck")]
#[command(about = "Grade and dispatch identity applications to authenticator services")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dispatch an application to the best-graded service and print the outcome
    Dispatch {
        /// Application document (JSON)
        #[arg(short, long)]
        application: PathBuf,

        /// Validation timeout in seconds (overrides the configuration)
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,
    },
    /// Show how every service grades an application
    Grades {
        /// Application document (JSON)
        #[arg(short, long)]
        application: PathBuf,
    },
    /// List the administration pages published by the services
    Pages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Dispatch {
            application,
            timeout,
        } => {
            let outcome = commands::execute_dispatch(cli.config, application, timeout).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.is_unsupported() {
                eprintln!("No authenticator available for this application");
                std::process::exit(2);
            }
            Ok(())
        }
        Commands::Grades { application } => {
            let grades = commands::execute_grades(cli.config, application).await?;
            println!("{}", serde_json::to_string_pretty(&grades)?);
            Ok(())
        }
        Commands::Pages => {
            let pages = commands::execute_pages(cli.config)?;
            for page in pages {
                println!(
                    "{:<40} {:<45} {}",
                    page.title, page.path, page.required_privilege
                );
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Logs go to stderr so stdout stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
