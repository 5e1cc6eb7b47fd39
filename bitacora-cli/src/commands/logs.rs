//! Logs command - view and manage the event log

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use dialoguer::Confirm;
use serde_json::json;

use super::{get_data_dir, print_json};
use bitacora_core::services::{EntryPoint, LoggingService};

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Only entries about this entity id
        #[arg(long)]
        entity: Option<String>,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Show log statistics and database path
    Stats,
}

fn get_logging_service() -> Result<LoggingService> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: LogsCommands, json: bool) -> Result<()> {
    let service = get_logging_service()?;

    match command {
        LogsCommands::List {
            limit,
            errors,
            entity,
        } => {
            let entries = match (&entity, errors) {
                (Some(id), _) => service.get_for_entity(id, limit)?,
                (None, true) => service.get_errors(limit)?,
                (None, false) => service.get_recent(limit)?,
            };

            if json {
                return print_json(&entries);
            }

            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Time", "Entry", "Event", "Subject", "Error"]);

            for entry in &entries {
                let subject = match (&entry.entity, &entry.entity_id) {
                    (Some(kind), Some(id)) => format!("{} {}", kind, id),
                    _ => entry.command.clone().unwrap_or_default(),
                };
                let error = entry
                    .error_message
                    .as_deref()
                    .map(|msg| msg.red().to_string())
                    .unwrap_or_default();

                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    entry.entry_point.clone(),
                    entry.event.clone(),
                    subject,
                    error,
                ]);
            }

            println!("{}", table);
        }
        LogsCommands::Clear {
            older_than_days,
            force,
        } => {
            let cutoff = Utc::now() - chrono::Duration::days(older_than_days as i64);

            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete logs older than {} days?", older_than_days))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = service.delete_before(cutoff.timestamp_millis())?;

            if json {
                print_json(json!({ "deleted": deleted }))?;
            } else {
                println!("Deleted {} log entries", deleted);
            }
        }
        LogsCommands::Stats => {
            let total = service.count()?;
            let errors = service.get_errors(1000)?.len();
            let events = service.event_counts()?;
            let db_path = service.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

            if json {
                print_json(json!({
                    "total_entries": total,
                    "error_count": errors,
                    "events": events.iter().map(|(e, n)| json!({"event": e, "count": n})).collect::<Vec<_>>(),
                    "database_path": db_path.to_string_lossy(),
                    "database_size_bytes": size_bytes
                }))?;
            } else {
                println!("{}", "Log Statistics".bold());
                println!("  Total entries: {}", total);
                println!("  Errors: {}", errors);
                println!("  Database: {}", db_path.display());
                println!("  Size: {} bytes", size_bytes);
                if !events.is_empty() {
                    println!();
                    println!("{}", "Events".bold());
                    for (event, count) in events.iter().take(15) {
                        println!("  {:<32} {}", event, count);
                    }
                }
            }
        }
    }

    Ok(())
}
