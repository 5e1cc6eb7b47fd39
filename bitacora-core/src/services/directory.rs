//! Directory service - clients, users, assets and surveys
//!
//! Plain create/get access to the records the service-log engine refers to.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    ActiveSurvey, Asset, AssetKind, BalancePool, Balances, Client, LedgerDraft, Question, Role,
    Survey, User,
};
use crate::ports::Repository;

use super::boundary::AtBoundary;
use super::logging::{LogEvent, LoggingService};

/// Request to register a client with its opening balances
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
    pub company_name: String,
    pub tax_id: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub opening: Balances,
}

pub struct DirectoryService {
    repository: Arc<dyn Repository>,
    logger: Arc<LoggingService>,
}

impl DirectoryService {
    pub fn new(repository: Arc<dyn Repository>, logger: Arc<LoggingService>) -> Self {
        Self { repository, logger }
    }

    // === Clients ===

    /// Register a client; every non-zero opening pool becomes an `opening` ledger entry
    pub fn create_client(&self, input: NewClient) -> Result<Client> {
        let mut client = Client::new(
            input.company_name.trim(),
            Client::normalize_tax_id(&input.tax_id),
        );
        client.contact_name = input.contact_name.filter(|s| !s.trim().is_empty());
        client.contact_email = input.contact_email.filter(|s| !s.trim().is_empty());
        client.validate().map_err(Error::invalid)?;

        if self
            .repository
            .get_client_by_tax_id(&client.tax_id)
            .at_boundary(&self.logger, "client_create_failed")?
            .is_some()
        {
            return Err(Error::conflict(format!(
                "a client with tax id {} already exists",
                client.tax_id
            )));
        }

        let opening: Vec<LedgerDraft> = [BalancePool::Individual, BalancePool::Package]
            .into_iter()
            .map(|pool| {
                LedgerDraft::opening(
                    client.id,
                    pool,
                    input.opening.hours(pool),
                    input.opening.money(pool),
                )
            })
            .filter(|draft| !draft.is_empty())
            .collect();

        self.repository
            .insert_client(&client, &opening)
            .at_boundary(&self.logger, "client_create_failed")?;
        client.balances = input.opening;

        self.logger
            .record(LogEvent::new("client_created").with_entity("client", client.id));
        Ok(client)
    }

    pub fn get_client(&self, id: Uuid) -> Result<Client> {
        self.repository
            .get_client(id)
            .at_boundary(&self.logger, "client_read_failed")?
            .ok_or_else(|| Error::not_found(format!("client {}", id)))
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        self.repository
            .get_clients()
            .at_boundary(&self.logger, "client_read_failed")
    }

    // === Users ===

    pub fn create_user(&self, name: &str, email: &str, role: Role) -> Result<User> {
        if name.trim().is_empty() {
            return Err(Error::invalid("user name cannot be empty"));
        }
        if !email.contains('@') {
            return Err(Error::invalid(format!("'{}' is not an email address", email)));
        }
        let user = User::new(name.trim(), email, role);
        self.repository
            .insert_user(&user)
            .at_boundary(&self.logger, "user_create_failed")?;

        self.logger.record(LogEvent::new("user_created").with_entity("user", user.id));
        Ok(user)
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.repository
            .get_user(id)
            .at_boundary(&self.logger, "user_read_failed")?
            .ok_or_else(|| Error::not_found(format!("user {}", id)))
    }

    // === Assets ===

    pub fn create_asset(&self, kind: AssetKind, name: &str, client_id: Option<Uuid>) -> Result<Asset> {
        if name.trim().is_empty() {
            return Err(Error::invalid(format!("{} name cannot be empty", kind)));
        }
        if let Some(client_id) = client_id {
            self.get_client(client_id)?;
        }
        let mut asset = Asset::new(kind, name.trim());
        asset.client_id = client_id;
        self.repository
            .insert_asset(&asset)
            .at_boundary(&self.logger, "asset_create_failed")?;

        self.logger
            .record(LogEvent::new("asset_created").with_entity(kind.as_str(), asset.id));
        Ok(asset)
    }

    pub fn set_asset_active(&self, kind: AssetKind, id: Uuid, active: bool) -> Result<()> {
        let updated = self
            .repository
            .set_asset_active(kind, id, active)
            .at_boundary(&self.logger, "asset_update_failed")?;
        if !updated {
            return Err(Error::not_found(format!("{} {}", kind, id)));
        }
        Ok(())
    }

    // === Surveys ===

    pub fn create_survey(&self, title: &str) -> Result<Survey> {
        if title.trim().is_empty() {
            return Err(Error::invalid("survey title cannot be empty"));
        }
        let survey = Survey::new(title.trim());
        self.repository
            .insert_survey(&survey)
            .at_boundary(&self.logger, "survey_create_failed")?;
        Ok(survey)
    }

    /// Append a question; without `position` it goes after the last one
    pub fn add_question(&self, survey_id: Uuid, text: &str, position: Option<i32>) -> Result<Question> {
        if text.trim().is_empty() {
            return Err(Error::invalid("question text cannot be empty"));
        }
        self.repository
            .get_survey(survey_id)
            .at_boundary(&self.logger, "survey_read_failed")?
            .ok_or_else(|| Error::not_found(format!("survey {}", survey_id)))?;

        let position = match position {
            Some(p) => p,
            None => self
                .active_survey()
                .ok()
                .filter(|active| active.survey.id == survey_id)
                .and_then(|active| active.questions.iter().map(|q| q.position).max())
                .map_or(0, |last| last + 1),
        };
        let question = Question::new(survey_id, text.trim(), position);
        self.repository
            .insert_question(&question)
            .at_boundary(&self.logger, "survey_create_failed")?;
        Ok(question)
    }

    pub fn active_survey(&self) -> Result<ActiveSurvey> {
        self.repository
            .get_active_survey()
            .at_boundary(&self.logger, "survey_read_failed")?
            .ok_or_else(|| Error::not_found("no active survey"))
    }
}

/// Zero balances with `hours`/`money` in one pool
pub fn opening_in(pool: BalancePool, hours: i64, money: Decimal) -> Balances {
    let mut balances = Balances::default();
    balances.apply(pool, hours, money);
    balances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::Fixture;

    fn service(fx: &Fixture) -> DirectoryService {
        DirectoryService::new(fx.repository(), fx.logger.clone())
    }

    #[test]
    fn test_create_client_with_opening_entries() {
        let fx = Fixture::new();
        let directory = service(&fx);

        let client = directory
            .create_client(NewClient {
                company_name: "Acme".to_string(),
                tax_id: "ab-123 456".to_string(),
                opening: opening_in(BalancePool::Package, 20, Decimal::from(1600)),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(client.tax_id, "AB123456");
        let stored = directory.get_client(client.id).unwrap();
        assert_eq!(stored.balances.package_hours, 20);
        assert_eq!(stored.balances.individual_hours, 0);
        // Only the non-zero pool gets an entry
        assert_eq!(fx.repo.get_ledger_entries(client.id).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_tax_id_is_conflict() {
        let fx = Fixture::new();
        let directory = service(&fx);
        let input = NewClient {
            company_name: "Acme".to_string(),
            tax_id: "AB-1".to_string(),
            ..Default::default()
        };

        directory.create_client(input.clone()).unwrap();
        let mut again = input;
        again.tax_id = "ab1".to_string();
        assert!(matches!(directory.create_client(again), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_asset_activation() {
        let fx = Fixture::new();
        let directory = service(&fx);

        let asset = directory.create_asset(AssetKind::System, "ERP", None).unwrap();
        directory.set_asset_active(AssetKind::System, asset.id, false).unwrap();
        assert!(!fx.repo.get_asset(AssetKind::System, asset.id).unwrap().unwrap().active);

        // Same id under the other kind does not exist
        let wrong_kind = directory.set_asset_active(AssetKind::Equipment, asset.id, true);
        assert!(matches!(wrong_kind, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_questions_append_in_order() {
        let fx = Fixture::new();
        let directory = service(&fx);

        let survey = directory.create_survey("Satisfaction").unwrap();
        directory.add_question(survey.id, "Was the technician on time?", None).unwrap();
        directory.add_question(survey.id, "Was the issue solved?", None).unwrap();

        let active = directory.active_survey().unwrap();
        assert_eq!(active.survey.id, survey.id);
        let positions: Vec<i32> = active.questions.iter().map(|q| q.position).collect();
        assert_eq!(positions, vec![0, 1]);

        let missing = directory.add_question(Uuid::new_v4(), "Orphan?", None);
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }
}
