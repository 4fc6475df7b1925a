// Copyright 2026 Leadscout Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use leadscout::cli;

#[derive(Parser)]
#[command(
    name = "leadscout",
    about = "Leadscout — harvest lead posts from a script-rendered feed",
    version,
    after_help = "Run 'leadscout <command> --help' for details on each command."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Suppress non-essential logging
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single acquisition cycle
    Run {
        /// Path to the configuration file
        #[arg(long, short, default_value = "leadscout.json")]
        config: PathBuf,
    },
    /// Run acquisition cycles on an interval until interrupted
    Watch {
        /// Path to the configuration file
        #[arg(long, short, default_value = "leadscout.json")]
        config: PathBuf,
        /// Seconds between cycle starts
        #[arg(long, default_value = "3600")]
        interval: u64,
    },
    /// List the unreported lead backlog
    Leads {
        /// Path to the configuration file
        #[arg(long, short, default_value = "leadscout.json")]
        config: PathBuf,
        /// Print one JSON object per lead
        #[arg(long)]
        json: bool,
    },
    /// Show store totals for the configured deployment
    Status {
        /// Path to the configuration file
        #[arg(long, short, default_value = "leadscout.json")]
        config: PathBuf,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_directive = if verbose {
        "leadscout=debug"
    } else if quiet {
        "leadscout=error"
    } else {
        "leadscout=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_directive.parse().unwrap()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run { config } => cli::run_cmd::run(&config).await,
        Commands::Watch { config, interval } => cli::watch_cmd::run(&config, interval).await,
        Commands::Leads { config, json } => cli::leads_cmd::run(&config, json),
        Commands::Status { config } => cli::status_cmd::run(&config),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "leadscout", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
