//! Bitacora CLI - service logs, balances and signatures from the terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use bitacora_core::{ErrorKind, OperationResult};
use commands::{
    asset, config, doctor, ledger, logs, new, payment, pricing, service_log, signature, status,
    survey,
};

/// Bitacora - service-log accounting and client signatures
#[derive(Parser)]
#[command(name = "bitacora", version, about, long_about = None)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show clients, balances and pending work
    Status,

    /// Run database health checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Create clients, technicians, assets and surveys
    New {
        #[command(subcommand)]
        command: new::NewCommands,
    },

    /// Activate or deactivate equipment and systems
    Asset {
        #[command(subcommand)]
        command: asset::AssetCommands,
    },

    /// Show or change hour prices and commission
    Pricing {
        #[command(subcommand)]
        command: pricing::PricingCommands,
    },

    /// Credit hours and/or money to a client pool
    Payment {
        /// Client ID
        #[arg(long)]
        client: String,
        /// Pool to credit (individual or package)
        #[arg(long)]
        pool: String,
        /// Hours to credit
        #[arg(long, default_value = "0")]
        hours: u32,
        /// Money to credit
        #[arg(long, default_value = "0")]
        money: String,
    },

    /// Inspect a client's balance ledger
    Ledger {
        #[command(subcommand)]
        command: ledger::LedgerCommands,
    },

    /// Record and inspect service logs
    #[command(name = "service-log")]
    ServiceLog {
        #[command(subcommand)]
        command: service_log::ServiceLogCommands,
    },

    /// Remote signature links
    Signature {
        #[command(subcommand)]
        command: signature::SignatureCommands,
    },

    /// Satisfaction survey
    Survey {
        #[command(subcommand)]
        command: survey::SurveyCommands,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                let kind = e
                    .downcast_ref::<bitacora_core::Error>()
                    .map_or(ErrorKind::Internal, |err| err.kind());
                let failure = OperationResult::<()>::fail(kind, e.to_string());
                match serde_json::to_string_pretty(&failure) {
                    Ok(text) => println!("{}", text),
                    Err(_) => output::error(&e.to_string()),
                }
            } else {
                output::error(&format!("{:#}", e));
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Status => status::run(json),
        Commands::Doctor { verbose } => doctor::run(verbose, json),
        Commands::Logs { command } => logs::run(command, json),
        Commands::New { command } => new::run(command, json),
        Commands::Asset { command } => asset::run(command, json),
        Commands::Pricing { command } => pricing::run(command, json),
        Commands::Payment {
            client,
            pool,
            hours,
            money,
        } => payment::run(&client, &pool, hours, &money, json),
        Commands::Ledger { command } => ledger::run(command, json),
        Commands::ServiceLog { command } => service_log::run(command, json),
        Commands::Signature { command } => signature::run(command, json),
        Commands::Survey { command } => survey::run(command, json),
        Commands::Config { command } => config::run(command, json),
    }
}
