//! Service boundary error handling
//!
//! Adapter-level failures (database, I/O, serialization) are logged with
//! their cause and surface to callers only as `Internal`.

use crate::domain::result::{Error, Result};

use super::logging::{LogEvent, LoggingService};

pub(crate) trait AtBoundary<T> {
    /// Downgrade infrastructure errors to `Internal`, logging the cause as `event`
    fn at_boundary(self, logger: &LoggingService, event: &str) -> Result<T>;
}

impl<T> AtBoundary<T> for Result<T> {
    fn at_boundary(self, logger: &LoggingService, event: &str) -> Result<T> {
        self.map_err(|err| {
            if !err.is_infrastructure() {
                return err;
            }
            logger.record(
                LogEvent::new(event)
                    .with_error("internal failure")
                    .with_error_details(err.to_string()),
            );
            Error::Internal("unexpected storage failure".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::EntryPoint;
    use tempfile::tempdir;

    #[test]
    fn test_infrastructure_error_is_hidden_and_logged() {
        let dir = tempdir().unwrap();
        let logger = LoggingService::new(dir.path(), EntryPoint::Service, "test").unwrap();

        let failed: Result<()> = Err(Error::database("Constraint Error: disk on fire"));
        let err = failed.at_boundary(&logger, "payment_failed").unwrap_err();

        assert!(matches!(err, Error::Internal(_)));
        assert!(!err.to_string().contains("disk on fire"));
        let logged = logger.get_errors(10).unwrap();
        assert_eq!(logged[0].event, "payment_failed");
        assert!(logged[0].error_details.as_deref().unwrap().contains("disk on fire"));
    }

    #[test]
    fn test_domain_errors_pass_through() {
        let dir = tempdir().unwrap();
        let logger = LoggingService::new(dir.path(), EntryPoint::Service, "test").unwrap();

        let failed: Result<()> = Err(Error::conflict("already graded"));
        let err = failed.at_boundary(&logger, "survey_grade_failed").unwrap_err();

        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(logger.count().unwrap(), 0);
    }
}
