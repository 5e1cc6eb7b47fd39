//! Doctor command - run database health checks

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use serde_json::Value;

use super::{get_context, print_json};

/// Format a detail JSON value for display
fn format_detail(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let display_val = match v {
                    Value::String(s) => s.clone(),
                    Value::Array(arr) if arr.len() > 5 => format!("[{} items]", arr.len()),
                    Value::Object(_) => "{..}".to_string(),
                    _ => v.to_string(),
                };
                format!("{}: {}", k, display_val)
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

pub fn run(verbose: bool, json: bool) -> Result<()> {
    let ctx = get_context("doctor")?;
    let result = ctx.doctor_service.run_checks()?;

    if json {
        print_json(&result)?;
    } else {
        println!("{}", "Database Health Check".bold());
        println!();

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Check", "Status", "Message"]);

        let mut names: Vec<&String> = result.checks.keys().collect();
        names.sort();
        for name in names {
            let check = &result.checks[name];
            let status_cell = match check.status.as_str() {
                "pass" => Cell::new("PASS").fg(Color::Green),
                "warning" => Cell::new("WARN").fg(Color::Yellow),
                "error" => Cell::new("ERROR").fg(Color::Red),
                _ => Cell::new(&check.status),
            };

            table.add_row(vec![Cell::new(name), status_cell, Cell::new(&check.message)]);

            if verbose {
                for detail in check.details.iter().flatten() {
                    table.add_row(vec![
                        Cell::new(""),
                        Cell::new(""),
                        Cell::new(format!("  - {}", format_detail(detail))),
                    ]);
                }
            }
        }

        println!("{}", table);
        println!();
        println!(
            "Summary: {} passed, {} warnings, {} errors",
            result.summary.passed.to_string().green(),
            result.summary.warnings.to_string().yellow(),
            result.summary.errors.to_string().red(),
        );
    }

    if result.summary.errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}
