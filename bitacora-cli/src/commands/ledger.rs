//! Ledger command - balances, history and chain verification

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::{get_context, parse_id, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum LedgerCommands {
    /// Show a client's current balances
    Balance {
        /// Client ID
        client: String,
    },
    /// List a client's ledger entries in order
    Entries {
        /// Client ID
        client: String,
    },
    /// Recompute hashes and sums for one client, or all clients
    Verify {
        /// Client ID (all clients when omitted)
        client: Option<String>,
    },
}

pub fn run(command: LedgerCommands, json: bool) -> Result<()> {
    match command {
        LedgerCommands::Balance { client } => {
            let client_id = parse_id("client", &client)?;
            let ctx = get_context("ledger balance")?;
            let balances = ctx.ledger_service.balance(client_id)?;

            if json {
                return print_json(&balances);
            }
            println!("{}", output::balances_table(&balances));
        }
        LedgerCommands::Entries { client } => {
            let client_id = parse_id("client", &client)?;
            let ctx = get_context("ledger entries")?;
            let entries = ctx.ledger_service.entries(client_id)?;

            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No ledger entries.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["#", "When", "Source", "Pool", "Hours", "Money", "Reference"]);
            for entry in &entries {
                table.add_row(vec![
                    entry.seq.to_string(),
                    entry.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    entry.source.to_string(),
                    entry.pool.to_string(),
                    output::hours(entry.hours_delta),
                    output::money(entry.money_delta),
                    entry.reference_id.map(|id| id.to_string()).unwrap_or_default(),
                ]);
            }
            println!("{}", table);
        }
        LedgerCommands::Verify { client } => {
            let ctx = get_context("ledger verify")?;
            let results = match client {
                Some(id) => vec![ctx.ledger_service.verify(parse_id("client", &id)?)?],
                None => ctx.ledger_service.verify_all()?,
            };

            if json {
                return print_json(&results);
            }
            for result in &results {
                if result.is_valid() {
                    println!("{} {} ({} entries)", "OK".green(), result.client_id, result.entries);
                } else {
                    println!("{} {}", "BROKEN".red(), result.client_id);
                    if !result.broken_links.is_empty() {
                        println!("  broken at seq {:?}", result.broken_links);
                    }
                    if !result.projection_matches {
                        println!("  stored balances differ from the ledger sum");
                    }
                }
            }
            if results.iter().any(|r| !r.is_valid()) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
