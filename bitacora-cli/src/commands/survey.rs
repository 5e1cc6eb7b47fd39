//! Survey command - show the active survey and grade service logs

use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Select;

use bitacora_core::Answers;

use super::{get_context, parse_id, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum SurveyCommands {
    /// Show the active survey and its questions
    Show,
    /// Grade a service log from the client's answers
    Grade {
        /// Service log ID
        log: String,
        /// Answer as QUESTION_ID=VALUE (1-5); prompts for each question when omitted
        #[arg(long = "answer", value_name = "QUESTION_ID=VALUE")]
        answers: Vec<String>,
    },
}

fn parse_answer(raw: &str) -> Result<(uuid::Uuid, u8)> {
    let (question, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Answers look like QUESTION_ID=VALUE, got '{}'", raw))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("Answer value must be a number from 1 to 5, got '{}'", value))?;
    Ok((parse_id("question", question)?, value))
}

pub fn run(command: SurveyCommands, json: bool) -> Result<()> {
    match command {
        SurveyCommands::Show => {
            let ctx = get_context("survey show")?;
            let active = ctx.directory_service.active_survey()?;

            if json {
                return print_json(&active);
            }
            println!("{}", active.survey.title.bold());
            let mut table = output::create_table();
            table.set_header(vec!["#", "Question", "ID"]);
            for question in &active.questions {
                table.add_row(vec![
                    question.position.to_string(),
                    question.text.clone(),
                    question.id.to_string(),
                ]);
            }
            println!("{}", table);
        }
        SurveyCommands::Grade { log, answers } => {
            let log_id = parse_id("service log", &log)?;
            let ctx = get_context("survey grade")?;

            let answers: Answers = if answers.is_empty() {
                let active = ctx.directory_service.active_survey()?;
                let scale = ["1", "2", "3", "4", "5"];
                let mut collected = Answers::new();
                for question in &active.questions {
                    let picked = Select::new()
                        .with_prompt(&question.text)
                        .items(&scale)
                        .default(4)
                        .interact()?;
                    collected.insert(question.id, picked as u8 + 1);
                }
                collected
            } else {
                answers
                    .iter()
                    .map(|raw| parse_answer(raw))
                    .collect::<Result<_>>()?
            };

            let result = ctx.survey_service.submit_grade(log_id, &answers)?;

            if json {
                return print_json(&result);
            }
            output::success(&format!("Graded {}/10 (mean {})", result.grade, result.mean));
        }
    }

    Ok(())
}
