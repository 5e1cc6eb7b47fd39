//! New command - register clients, staff, assets and surveys

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Input;

use bitacora_core::domain::AssetKind;
use bitacora_core::services::NewClient;
use bitacora_core::{BalancePool, Balances, Role};

use super::{get_context, parse_id, parse_money, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum NewCommands {
    /// Register a client with optional opening balances
    Client {
        /// Company name
        #[arg(long)]
        name: Option<String>,
        /// Tax id (unique)
        #[arg(long)]
        tax_id: Option<String>,
        /// Contact person
        #[arg(long)]
        contact: Option<String>,
        /// Contact email
        #[arg(long)]
        email: Option<String>,
        /// Opening individual hours
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        individual_hours: i64,
        /// Opening individual money
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        individual_money: String,
        /// Opening package hours
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        package_hours: i64,
        /// Opening package money
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        package_money: String,
    },
    /// Register a technician (or an administrator with --admin)
    Technician {
        /// Full name
        #[arg(long)]
        name: Option<String>,
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Grant the admin role
        #[arg(long)]
        admin: bool,
    },
    /// Register a piece of equipment
    Equipment {
        /// Equipment name
        name: String,
        /// Owning client ID
        #[arg(long)]
        client: Option<String>,
    },
    /// Register a system
    System {
        /// System name
        name: String,
        /// Owning client ID
        #[arg(long)]
        client: Option<String>,
    },
    /// Create a survey; the newest active survey is the one clients answer
    Survey {
        /// Survey title
        title: String,
    },
    /// Add a question to a survey
    Question {
        /// Survey ID
        #[arg(long)]
        survey: String,
        /// Question text
        text: String,
        /// Position (defaults to after the last question)
        #[arg(long)]
        position: Option<i32>,
    },
}

fn prompt_if_missing(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::new().with_prompt(prompt).interact_text()?),
    }
}

pub fn run(command: NewCommands, json: bool) -> Result<()> {
    match command {
        NewCommands::Client {
            name,
            tax_id,
            contact,
            email,
            individual_hours,
            individual_money,
            package_hours,
            package_money,
        } => {
            let company_name = prompt_if_missing(name, "Company name")?;
            let tax_id = prompt_if_missing(tax_id, "Tax id")?;

            let mut opening = Balances::default();
            opening.apply(BalancePool::Individual, individual_hours, parse_money(&individual_money)?);
            opening.apply(BalancePool::Package, package_hours, parse_money(&package_money)?);

            let ctx = get_context("new client")?;
            let client = ctx.directory_service.create_client(NewClient {
                company_name,
                tax_id,
                contact_name: contact,
                contact_email: email,
                opening,
            })?;

            if json {
                return print_json(&client);
            }
            println!("{}", "Client created".green());
            println!("  ID: {}", client.id);
            println!("  Company: {}", client.company_name);
            println!("  Tax id: {}", client.tax_id);
            println!("{}", output::balances_table(&client.balances));
        }
        NewCommands::Technician { name, email, admin } => {
            let name = prompt_if_missing(name, "Name")?;
            let email = prompt_if_missing(email, "Email")?;
            let role = if admin { Role::Admin } else { Role::Technician };

            let ctx = get_context("new technician")?;
            let user = ctx.directory_service.create_user(&name, &email, role)?;

            if json {
                return print_json(&user);
            }
            output::success(&format!("{} {} created", role, user.name));
            println!("  ID: {}", user.id);
        }
        NewCommands::Equipment { name, client } => {
            create_asset(AssetKind::Equipment, &name, client.as_deref(), json)?
        }
        NewCommands::System { name, client } => {
            create_asset(AssetKind::System, &name, client.as_deref(), json)?
        }
        NewCommands::Survey { title } => {
            let ctx = get_context("new survey")?;
            let survey = ctx.directory_service.create_survey(&title)?;

            if json {
                return print_json(&survey);
            }
            output::success(&format!("Survey '{}' created", survey.title));
            println!("  ID: {}", survey.id);
            output::info("Add questions with: bitacora new question --survey <ID> \"text\"");
        }
        NewCommands::Question {
            survey,
            text,
            position,
        } => {
            let survey_id = parse_id("survey", &survey)?;
            let ctx = get_context("new question")?;
            let question = ctx.directory_service.add_question(survey_id, &text, position)?;

            if json {
                return print_json(&question);
            }
            output::success(&format!("Question #{} added", question.position));
            println!("  ID: {}", question.id);
        }
    }

    Ok(())
}

fn create_asset(kind: AssetKind, name: &str, client: Option<&str>, json: bool) -> Result<()> {
    let client_id = client.map(|id| parse_id("client", id)).transpose()?;
    let ctx = get_context(&format!("new {}", kind))?;
    let asset = ctx.directory_service.create_asset(kind, name, client_id)?;

    if json {
        return print_json(&asset);
    }
    output::success(&format!("{} '{}' created", kind, asset.name));
    println!("  ID: {}", asset.id);
    Ok(())
}
