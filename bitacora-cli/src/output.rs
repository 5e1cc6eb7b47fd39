//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use rust_decimal::Decimal;

use bitacora_core::Balances;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Money with two decimals, negatives in red
pub fn money(amount: Decimal) -> String {
    let text = format!("{:.2}", amount);
    if amount.is_sign_negative() && !amount.is_zero() {
        text.red().to_string()
    } else {
        text
    }
}

pub fn hours(value: i64) -> String {
    if value < 0 {
        format!("{}h", value).red().to_string()
    } else {
        format!("{}h", value)
    }
}

/// Two-row table of both balance pools
pub fn balances_table(balances: &Balances) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Pool", "Hours", "Money"]);
    table.add_row(vec![
        "Individual".to_string(),
        hours(balances.individual_hours),
        money(balances.individual_money),
    ]);
    table.add_row(vec![
        "Package".to_string(),
        hours(balances.package_hours),
        money(balances.package_money),
    ]);
    table
}
