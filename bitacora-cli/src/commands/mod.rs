//! CLI command implementations

pub mod asset;
pub mod config;
pub mod doctor;
pub mod ledger;
pub mod logs;
pub mod new;
pub mod payment;
pub mod pricing;
pub mod service_log;
pub mod signature;
pub mod status;
pub mod survey;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use bitacora_core::services::{EntryPoint, LogEvent};
use bitacora_core::{BitacoraContext, OperationResult};

/// Get the bitacora data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("BITACORA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".bitacora"))
        .ok_or_else(|| anyhow!("Could not find home directory; set BITACORA_DIR"))
}

/// Open the context and record which command is running
pub fn get_context(command: &str) -> Result<BitacoraContext> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    let ctx = BitacoraContext::new(&data_dir, EntryPoint::Cli)
        .context("Failed to initialize bitacora context")?;
    ctx.logger.record(LogEvent::new("command").with_command(command));
    Ok(ctx)
}

/// Print `data` wrapped in a successful `OperationResult`
pub fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&OperationResult::ok(data))?);
    Ok(())
}

pub fn parse_id(label: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim()).map_err(|_| anyhow!("Invalid {} id: {}", label, value))
}

pub fn parse_money(value: &str) -> Result<Decimal> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid amount: {}", value))
}

/// Accepts RFC 3339 or `YYYY-MM-DD HH:MM` (taken as UTC)
pub fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .map(|naive| naive.and_utc())
        .map_err(|_| anyhow!("Invalid time '{}'. Use RFC 3339 or YYYY-MM-DD HH:MM", value))
}

/// Read a PNG from disk as the base64 payload signatures are submitted with
pub fn read_png_base64(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}
