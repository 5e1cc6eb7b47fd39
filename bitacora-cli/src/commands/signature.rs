//! Signature command - remote links, token checks and finalization

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;

use super::{get_context, parse_id, print_json, read_png_base64};
use crate::output;

#[derive(Subcommand)]
pub enum SignatureCommands {
    /// Issue a remote signature link
    Link {
        /// Service log the signature belongs to
        #[arg(long)]
        log: Option<String>,
    },
    /// Check a token as if its link had been opened
    Validate {
        /// Token (last path segment of the link)
        token: String,
    },
    /// Attach the client's signature image
    Finalize {
        /// Signature ID
        id: String,
        /// PNG file with the signature
        #[arg(long, conflicts_with = "image")]
        file: Option<PathBuf>,
        /// Base64 PNG or data URL
        #[arg(long)]
        image: Option<String>,
    },
}

pub fn run(command: SignatureCommands, json: bool) -> Result<()> {
    match command {
        SignatureCommands::Link { log } => {
            let log_id = log.as_deref().map(|id| parse_id("service log", id)).transpose()?;
            let ctx = get_context("signature link")?;
            let link = ctx.signature_service.create_remote_link(log_id)?;

            if json {
                return print_json(&link);
            }
            output::success("Signature link created");
            println!("  ID: {}", link.id);
            println!("  URL: {}", link.url.cyan());
            println!(
                "  {}",
                format!("Valid for {} minutes", ctx.config.link_validity_minutes).dimmed()
            );
        }
        SignatureCommands::Validate { token } => {
            // Accept a full link as well as a bare token
            let token = token.trim_end_matches('/').rsplit('/').next().unwrap_or_default().to_string();
            let ctx = get_context("signature validate")?;
            let outcome = ctx.signature_service.validate_token(&token)?;

            if json {
                return print_json(&outcome);
            }
            if outcome.valid {
                output::success("Link is valid");
                println!("  Signature ID: {}", outcome.signature_id);
            } else {
                output::warning("Link had expired; a new one was issued");
                println!("  Signature ID: {}", outcome.signature_id);
                if let Some(url) = &outcome.new_url {
                    println!("  New URL: {}", url.cyan());
                }
            }
        }
        SignatureCommands::Finalize { id, file, image } => {
            let signature_id = parse_id("signature", &id)?;
            let payload = match (file, image) {
                (Some(path), _) => read_png_base64(&path)?,
                (None, Some(image)) => image,
                (None, None) => bail!("Provide the signature with --file or --image"),
            };

            let ctx = get_context("signature finalize")?;
            let signature = ctx.signature_service.finalize(signature_id, &payload)?;

            if json {
                return print_json(&signature);
            }
            output::success("Signature recorded");
            if let Some(log_id) = signature.service_log_id {
                println!("  Service log: {}", log_id);
            }
        }
    }

    Ok(())
}
