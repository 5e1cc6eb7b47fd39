//! Asset command - activate or deactivate equipment and systems

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use serde_json::json;

use bitacora_core::domain::AssetKind;

use super::{get_context, parse_id, print_json};
use crate::output;

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
    Equipment,
    System,
}

impl From<Kind> for AssetKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Equipment => AssetKind::Equipment,
            Kind::System => AssetKind::System,
        }
    }
}

#[derive(Subcommand)]
pub enum AssetCommands {
    /// Allow new service logs to reference the asset
    Activate {
        #[arg(value_enum)]
        kind: Kind,
        /// Asset ID
        id: String,
    },
    /// Block new service logs from referencing the asset
    Deactivate {
        #[arg(value_enum)]
        kind: Kind,
        /// Asset ID
        id: String,
    },
}

pub fn run(command: AssetCommands, json: bool) -> Result<()> {
    let (kind, id, active) = match command {
        AssetCommands::Activate { kind, id } => (AssetKind::from(kind), id, true),
        AssetCommands::Deactivate { kind, id } => (AssetKind::from(kind), id, false),
    };
    let asset_id = parse_id(kind.as_str(), &id)?;

    let ctx = get_context(if active { "asset activate" } else { "asset deactivate" })?;
    ctx.directory_service.set_asset_active(kind, asset_id, active)?;

    if json {
        return print_json(json!({ "kind": kind, "id": asset_id, "active": active }));
    }
    output::success(&format!(
        "{} {} {}",
        kind,
        asset_id,
        if active { "activated" } else { "deactivated" }
    ));
    Ok(())
}
