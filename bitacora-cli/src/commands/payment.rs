//! Payment command - credit a client pool

use anyhow::{anyhow, Result};
use colored::Colorize;

use bitacora_core::BalancePool;

use super::{get_context, parse_id, parse_money, print_json};
use crate::output;

pub fn run(client: &str, pool: &str, hours: u32, money: &str, json: bool) -> Result<()> {
    let client_id = parse_id("client", client)?;
    let pool: BalancePool = pool.parse().map_err(|e: String| anyhow!(e))?;
    let money = parse_money(money)?;

    let ctx = get_context("payment")?;
    let receipt = ctx.ledger_service.record_payment(client_id, pool, hours, money)?;

    if json {
        return print_json(&receipt);
    }

    println!("{}", "Payment recorded".green());
    println!("  Entry: #{} ({})", receipt.entry.seq, receipt.entry.id);
    println!("  Credited: {}h / {} to {}", hours, output::money(money), pool);
    println!("{}", output::balances_table(&receipt.balances));
    Ok(())
}
