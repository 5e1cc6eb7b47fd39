//! Survey scoring - grades a service log from the client's answers

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::survey::{check_answers, compute_grade};
use crate::domain::{Answers, GradeResult};
use crate::ports::Repository;

use super::boundary::AtBoundary;
use super::logging::{LogEvent, LoggingService};

pub struct SurveyService {
    repository: Arc<dyn Repository>,
    logger: Arc<LoggingService>,
}

impl SurveyService {
    pub fn new(repository: Arc<dyn Repository>, logger: Arc<LoggingService>) -> Self {
        Self { repository, logger }
    }

    /// Grade a log from one answer (1-5) per active question
    ///
    /// A log is graded at most once; the answers are stored with the grade.
    pub fn submit_grade(&self, service_log_id: Uuid, answers: &Answers) -> Result<GradeResult> {
        self.submit_grade_checked(service_log_id, answers)
            .at_boundary(&self.logger, "survey_grade_failed")
    }

    fn submit_grade_checked(&self, service_log_id: Uuid, answers: &Answers) -> Result<GradeResult> {
        let log = self
            .repository
            .get_service_log(service_log_id)?
            .ok_or_else(|| Error::not_found(format!("service log {}", service_log_id)))?;
        let survey = self
            .repository
            .get_active_survey()?
            .ok_or_else(|| Error::not_found("no active survey"))?;

        check_answers(&survey, answers).map_err(Error::invalid)?;
        if log.is_graded() {
            return Err(Error::conflict("service log has already been graded"));
        }

        let values: Vec<u8> = answers.values().copied().collect();
        let result =
            compute_grade(&values).ok_or_else(|| Error::invalid("at least one answer is required"))?;

        if !self.repository.record_grade(log.id, result.grade, answers)? {
            return Err(Error::conflict("service log has already been graded"));
        }

        self.logger
            .record(LogEvent::new("survey_graded").with_entity("service_log", log.id));
        Ok(result)
    }
}
