//! Service-log command - record, inspect and delete visits

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use serde_json::json;

use bitacora_core::{NewServiceLog, ServiceLog};

use super::{get_context, parse_id, parse_time, print_json, read_png_base64};
use crate::output;

#[derive(Subcommand)]
pub enum ServiceLogCommands {
    /// Record a visit and debit the client's balance
    Create {
        /// Ticket number (unique)
        #[arg(long)]
        ticket: String,
        /// Client ID
        #[arg(long)]
        client: String,
        /// Technician ID
        #[arg(long)]
        technician: String,
        /// Scheduled arrival (RFC 3339 or YYYY-MM-DD HH:MM)
        #[arg(long)]
        arrival: String,
        /// Scheduled departure
        #[arg(long)]
        departure: String,
        /// Actual arrival
        #[arg(long)]
        actual_arrival: Option<String>,
        /// Actual departure
        #[arg(long)]
        actual_departure: Option<String>,
        /// Billing mode (Individual or Package)
        #[arg(long)]
        mode: String,
        /// Billable hours
        #[arg(long)]
        hours: u32,
        /// Work description
        #[arg(long, default_value = "")]
        description: String,
        /// Serviced equipment ID
        #[arg(long, conflicts_with = "system")]
        equipment: Option<String>,
        /// Serviced system ID
        #[arg(long)]
        system: Option<String>,
        /// PNG of the technician's signature
        #[arg(long)]
        signature_file: Option<PathBuf>,
    },
    /// Show one service log
    Show {
        /// Service log ID
        id: String,
    },
    /// List service logs, newest first
    List {
        /// Only logs of this client
        #[arg(long)]
        client: Option<String>,
    },
    /// Delete a service log (admins only; the debit stays on the ledger)
    Delete {
        /// Service log ID
        id: String,
        /// ID of the administrator performing the deletion
        #[arg(long)]
        actor: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

pub fn run(command: ServiceLogCommands, json: bool) -> Result<()> {
    match command {
        ServiceLogCommands::Create {
            ticket,
            client,
            technician,
            arrival,
            departure,
            actual_arrival,
            actual_departure,
            mode,
            hours,
            description,
            equipment,
            system,
            signature_file,
        } => {
            let input = NewServiceLog {
                ticket_number: ticket,
                client_id: parse_id("client", &client)?,
                technician_id: parse_id("technician", &technician)?,
                scheduled_arrival: parse_time(&arrival)?,
                scheduled_departure: parse_time(&departure)?,
                actual_arrival: actual_arrival.as_deref().map(parse_time).transpose()?,
                actual_departure: actual_departure.as_deref().map(parse_time).transpose()?,
                billing_mode: mode,
                hours,
                description,
                equipment_id: equipment.as_deref().map(|id| parse_id("equipment", id)).transpose()?,
                system_id: system.as_deref().map(|id| parse_id("system", id)).transpose()?,
                technician_signature: signature_file
                    .as_deref()
                    .map(read_png_base64)
                    .transpose()?,
            };

            let ctx = get_context("service-log create")?;
            let log = ctx.service_log_service.create(input)?;

            if json {
                return print_json(&log);
            }
            output::success(&format!("Service log {} recorded", log.ticket_number));
            print_log(&log);
            let balances = ctx.ledger_service.balance(log.client_id)?;
            println!("{}", output::balances_table(&balances));
        }
        ServiceLogCommands::Show { id } => {
            let log_id = parse_id("service log", &id)?;
            let ctx = get_context("service-log show")?;
            let log = ctx.service_log_service.get(log_id)?;

            if json {
                return print_json(&log);
            }
            print_log(&log);
        }
        ServiceLogCommands::List { client } => {
            let client_id = client.as_deref().map(|id| parse_id("client", id)).transpose()?;
            let ctx = get_context("service-log list")?;
            let logs = ctx.service_log_service.list(client_id)?;

            if json {
                return print_json(&logs);
            }
            if logs.is_empty() {
                println!("No service logs.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Ticket", "Date", "Mode", "Hours", "Amount", "Signed", "Grade"]);
            for log in &logs {
                table.add_row(vec![
                    log.ticket_number.clone(),
                    log.scheduled_arrival.format("%Y-%m-%d").to_string(),
                    log.billing_mode.to_string(),
                    log.hours.to_string(),
                    output::money(log.amount),
                    if log.is_signed_by_client() { "yes" } else { "no" }.to_string(),
                    log.grade.map(|g| g.to_string()).unwrap_or_default(),
                ]);
            }
            println!("{}", table);
        }
        ServiceLogCommands::Delete { id, actor, force } => {
            let log_id = parse_id("service log", &id)?;
            let actor_id = parse_id("actor", &actor)?;

            if !force && !json {
                println!("{}", "The consumed hours will not be refunded.".yellow());
                let confirmed = Confirm::new()
                    .with_prompt("Delete this service log?")
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("{}", "Cancelled".dimmed());
                    return Ok(());
                }
            }

            let ctx = get_context("service-log delete")?;
            ctx.service_log_service.delete(log_id, actor_id)?;

            if json {
                return print_json(json!({ "deleted": log_id }));
            }
            output::success(&format!("Service log {} deleted", log_id));
        }
    }

    Ok(())
}

fn print_log(log: &ServiceLog) {
    println!("{} {}", "Ticket".bold(), log.ticket_number);
    println!("  ID: {}", log.id);
    println!("  Client: {}", log.client_id);
    println!("  Technician: {}", log.technician_id);
    println!(
        "  Scheduled: {} - {}",
        log.scheduled_arrival.format("%Y-%m-%d %H:%M"),
        log.scheduled_departure.format("%H:%M")
    );
    if let (Some(start), Some(end)) = (log.actual_arrival, log.actual_departure) {
        println!("  Actual: {} - {}", start.format("%Y-%m-%d %H:%M"), end.format("%H:%M"));
    }
    println!("  {}: {}", log.asset.kind(), log.asset.id());
    println!(
        "  Billed: {}h {} = {}",
        log.hours,
        log.billing_mode,
        output::money(log.amount)
    );
    if !log.description.is_empty() {
        println!("  Work: {}", log.description);
    }
    match log.client_signature_id {
        Some(id) => println!("  Client signature: {}", id),
        None => println!("  Client signature: {}", "pending".yellow()),
    }
    if let Some(grade) = log.grade {
        println!("  Grade: {}/10", grade);
    }
}
