//! Pricing command - show or change hour prices and commission

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use bitacora_core::{BillingMode, Pricing, PricingSnapshot};

use super::{get_context, parse_money, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum PricingCommands {
    /// Show the pricing in effect
    Show,
    /// Change one or more pricing values
    Set {
        /// Price of one individual hour
        #[arg(long)]
        individual: Option<String>,
        /// Price of one package hour
        #[arg(long)]
        package: Option<String>,
        /// Commission percent added on top of the hour price
        #[arg(long)]
        commission: Option<String>,
    },
}

pub fn run(command: PricingCommands, json: bool) -> Result<()> {
    match command {
        PricingCommands::Show => {
            let ctx = get_context("pricing show")?;
            let snapshot = ctx.pricing.snapshot()?;
            if json {
                return print_json(&snapshot);
            }
            print_snapshot(&snapshot);
        }
        PricingCommands::Set {
            individual,
            package,
            commission,
        } => {
            let ctx = get_context("pricing set")?;
            let current = ctx.pricing.snapshot()?.pricing;

            let updated = Pricing {
                price_per_individual_hour: match individual {
                    Some(v) => parse_money(&v)?,
                    None => current.price_per_individual_hour,
                },
                price_per_package_hour: match package {
                    Some(v) => parse_money(&v)?,
                    None => current.price_per_package_hour,
                },
                commission_percent: match commission {
                    Some(v) => parse_money(&v)?,
                    None => current.commission_percent,
                },
            };

            if updated == current {
                output::info("Pricing unchanged");
                return Ok(());
            }

            let snapshot = ctx.pricing.update(updated)?;
            if json {
                return print_json(&snapshot);
            }
            output::success("Pricing updated");
            print_snapshot(&snapshot);
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &PricingSnapshot) {
    println!("{}", "Pricing".bold());

    let mut table = output::create_table();
    table.set_header(vec!["Mode", "Hour price", "With commission"]);
    for mode in [BillingMode::Individual, BillingMode::Package] {
        table.add_row(vec![
            mode.to_string(),
            output::money(snapshot.base_price(mode)),
            snapshot
                .amount_for(mode, 1)
                .map(output::money)
                .unwrap_or_else(|| "out of range".to_string()),
        ]);
    }
    println!("{}", table);
    println!("Commission: {}%", snapshot.pricing.commission_percent);
}
