//! Status command - clients, balances and pending work

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::{get_context, print_json};
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context("status")?;
    let status = ctx.status_service.get_status()?;

    if json {
        return print_json(&status);
    }

    println!("{}", "Bitacora Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let average = status
        .average_grade
        .map_or_else(|| "-".to_string(), |g| g.to_string());
    table.add_row(vec!["Clients", &status.total_clients.to_string()]);
    table.add_row(vec!["Staff", &status.total_users.to_string()]);
    table.add_row(vec!["Service logs", &status.total_service_logs.to_string()]);
    table.add_row(vec!["Awaiting client signature", &status.unsigned_service_logs.to_string()]);
    table.add_row(vec!["Open signature links", &status.pending_signatures.to_string()]);
    table.add_row(vec!["Graded logs", &status.graded_service_logs.to_string()]);
    table.add_row(vec!["Average grade", &average]);

    println!("{}", table);
    println!();

    match &status.pricing {
        Some(snapshot) => println!(
            "Pricing: individual {} / package {} per hour, commission {}%",
            snapshot.pricing.price_per_individual_hour,
            snapshot.pricing.price_per_package_hour,
            snapshot.pricing.commission_percent
        ),
        None => output::warning("Pricing has not been configured"),
    }

    if !status.clients.is_empty() {
        println!();
        println!("{}", "Client Balances".bold());
        let mut balances = output::create_table();
        balances.set_header(vec!["Client", "Individual", "", "Package", ""]);
        for client in &status.clients {
            balances.add_row(vec![
                client.company_name.clone(),
                output::hours(client.individual_hours),
                output::money(client.individual_money),
                output::hours(client.package_hours),
                output::money(client.package_money),
            ]);
        }
        println!("{}", balances);
    }

    Ok(())
}
