//! Banklink CLI - bank connections in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{connections, doctor, institutions, logs, remove, setup, status, token};

/// Banklink - manage open-banking credentials and bank connections
#[derive(Parser)]
#[command(name = "bl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configuration status and connection summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store aggregator credentials (validated against the aggregator)
    Setup {
        /// Aggregator secret id
        #[arg(long)]
        secret_id: Option<String>,
        /// Aggregator secret key (read from stdin when piped)
        #[arg(long)]
        secret_key: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove stored aggregator credentials
    Remove {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Check that a usable access token can be obtained
    Token {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List banks available in a country
    Institutions {
        /// ISO 3166 two-letter country code
        #[arg(long, short)]
        country: String,
        /// Only show institutions whose name contains this text
        #[arg(long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage bank connections
    Connections {
        #[command(subcommand)]
        command: connections::ConnectionsCommands,
    },

    /// Find (and optionally purge) transactions left without a connection
    Doctor {
        /// Delete orphaned transactions
        #[arg(long)]
        fix: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Status { .. } => "status",
            Commands::Setup { .. } => "setup",
            Commands::Remove { .. } => "remove",
            Commands::Token { .. } => "token",
            Commands::Institutions { .. } => "institutions",
            Commands::Connections { .. } => "connections",
            Commands::Doctor { .. } => "doctor",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logger = commands::get_logger();
    if let Some(logger) = &logger {
        let _ = logger.log_command(cli.command.name());
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Setup {
            secret_id,
            secret_key,
            json,
        } => setup::run(secret_id, secret_key, json),
        Commands::Remove { force } => remove::run(force),
        Commands::Token { json } => token::run(json),
        Commands::Institutions {
            country,
            search,
            json,
        } => institutions::run(&country, search.as_deref(), json),
        Commands::Connections { command } => connections::run(command),
        Commands::Doctor { fix, json } => doctor::run(fix, json),
        Commands::Logs { command } => logs::run(command),
    }
}
