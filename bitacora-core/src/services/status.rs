//! Status service - operator summary of clients, logs and signatures

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::PricingSnapshot;
use crate::ports::Repository;

use super::pricing::ConfigurationProvider;

pub struct StatusService {
    repository: Arc<dyn Repository>,
    pricing: Arc<ConfigurationProvider>,
}

impl StatusService {
    pub fn new(repository: Arc<dyn Repository>, pricing: Arc<ConfigurationProvider>) -> Self {
        Self {
            repository,
            pricing,
        }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let clients = self.repository.get_clients()?;
        let logs = self.repository.get_service_logs(None)?;
        let grades: Vec<u8> = logs.iter().filter_map(|log| log.grade).collect();

        let average_grade = if grades.is_empty() {
            None
        } else {
            let sum: u32 = grades.iter().map(|g| *g as u32).sum();
            Some((Decimal::from(sum) / Decimal::from(grades.len() as u32)).round_dp(2))
        };

        Ok(StatusSummary {
            total_clients: clients.len() as i64,
            total_users: self.repository.count_users()?,
            total_service_logs: logs.len() as i64,
            unsigned_service_logs: logs.iter().filter(|l| !l.is_signed_by_client()).count() as i64,
            pending_signatures: self.repository.count_drafts(None)?,
            graded_service_logs: grades.len() as i64,
            average_grade,
            pricing: self.pricing.snapshot().ok(),
            clients: clients
                .into_iter()
                .map(|c| ClientSummary {
                    id: c.id.to_string(),
                    company_name: c.company_name,
                    individual_hours: c.balances.individual_hours,
                    individual_money: c.balances.individual_money,
                    package_hours: c.balances.package_hours,
                    package_money: c.balances.package_money,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_clients: i64,
    pub total_users: i64,
    pub total_service_logs: i64,
    pub unsigned_service_logs: i64,
    pub pending_signatures: i64,
    pub graded_service_logs: i64,
    pub average_grade: Option<Decimal>,
    pub pricing: Option<PricingSnapshot>,
    pub clients: Vec<ClientSummary>,
}

#[derive(Debug, Serialize)]
pub struct ClientSummary {
    pub id: String,
    pub company_name: String,
    pub individual_hours: i64,
    pub individual_money: Decimal,
    pub package_hours: i64,
    pub package_money: Decimal,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::Role;
    use crate::services::test_support::Fixture;

    #[test]
    fn test_status_counts() {
        let fx = Fixture::new();
        fx.client();
        fx.user(Role::Technician);
        fx.user(Role::Admin);
        let pricing = Arc::new(ConfigurationProvider::new(
            fx.repository(),
            fx.logger.clone(),
            Duration::seconds(60),
        ));

        let status = StatusService::new(fx.repository(), pricing).get_status().unwrap();

        assert_eq!(status.total_clients, 1);
        assert_eq!(status.total_users, 2);
        assert_eq!(status.total_service_logs, 0);
        assert!(status.average_grade.is_none());
        assert!(status.pricing.is_some());
        assert_eq!(status.clients[0].individual_hours, 10);
    }
}
