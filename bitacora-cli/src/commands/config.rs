//! Config command - show or change settings.json

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

use bitacora_core::config::Config;

use super::{get_data_dir, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the resolved settings
    Show,
    /// Change settings
    Set {
        /// Public base URL for signature links
        #[arg(long)]
        base_url: Option<String>,
        /// Minutes a signature link stays valid
        #[arg(long)]
        link_validity_minutes: Option<i64>,
        /// Seconds pricing is cached
        #[arg(long)]
        pricing_cache_ttl_seconds: Option<i64>,
    },
}

pub fn run(command: ConfigCommands, json: bool) -> Result<()> {
    let data_dir = get_data_dir()?;
    let mut config = Config::load(&data_dir)?;

    if let ConfigCommands::Set {
        base_url,
        link_validity_minutes,
        pricing_cache_ttl_seconds,
    } = command
    {
        if let Some(url) = base_url {
            config.base_url = url;
        }
        if let Some(minutes) = link_validity_minutes {
            config.link_validity_minutes = minutes;
        }
        if let Some(seconds) = pricing_cache_ttl_seconds {
            config.pricing_cache_ttl_seconds = seconds;
        }
        config.validate()?;
        std::fs::create_dir_all(&data_dir)?;
        config.save(&data_dir)?;
        if !json {
            output::success("Settings saved");
        }
    }

    if json {
        return print_json(json!({
            "data_dir": data_dir.to_string_lossy(),
            "base_url": config.base_url,
            "link_validity_minutes": config.link_validity_minutes,
            "pricing_cache_ttl_seconds": config.pricing_cache_ttl_seconds,
        }));
    }

    println!("{}", "Settings".bold());
    println!("  Data directory: {}", data_dir.display());
    println!("  Base URL: {}", config.base_url);
    println!("  Link validity: {} minutes", config.link_validity_minutes);
    println!("  Pricing cache: {} seconds", config.pricing_cache_ttl_seconds);
    Ok(())
}
