//! Shared fixtures for service unit tests

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::{
    Asset, AssetKind, BalancePool, Client, LedgerDraft, Pricing, Question, Role, Survey, User,
};
use crate::ports::Repository;

use super::logging::{EntryPoint, LoggingService};

pub(crate) struct Fixture {
    pub repo: Arc<DuckDbRepository>,
    pub logger: Arc<LoggingService>,
    _dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(DuckDbRepository::in_memory().unwrap());
        repo.ensure_schema().unwrap();
        let logger = Arc::new(LoggingService::new(dir.path(), EntryPoint::Service, "test").unwrap());
        Self {
            repo,
            logger,
            _dir: dir,
        }
    }

    pub fn repository(&self) -> Arc<dyn Repository> {
        self.repo.clone()
    }

    pub fn link_validity(&self) -> Duration {
        Duration::minutes(120)
    }

    /// Individual 100/h, package 80/h, 15% commission
    pub fn with_pricing(&self) {
        self.repo
            .save_pricing(&Pricing {
                price_per_individual_hour: Decimal::from(100),
                price_per_package_hour: Decimal::from(80),
                commission_percent: Decimal::from(15),
            })
            .unwrap();
    }

    /// Client holding 10h/1000 individual and 5h/500 package
    pub fn client(&self) -> Client {
        let mut client = Client::new("Acme S.A.", format!("TAX-{}", Uuid::new_v4().simple()));
        let opening = [
            LedgerDraft::opening(client.id, BalancePool::Individual, 10, Decimal::from(1000)),
            LedgerDraft::opening(client.id, BalancePool::Package, 5, Decimal::from(500)),
        ];
        self.repo.insert_client(&client, &opening).unwrap();
        client.balances = self.repo.get_client(client.id).unwrap().unwrap().balances;
        client
    }

    pub fn user(&self, role: Role) -> User {
        let user = User::new("Ana Técnica", format!("{}@example.com", Uuid::new_v4().simple()), role);
        self.repo.insert_user(&user).unwrap();
        user
    }

    pub fn equipment(&self, active: bool) -> Asset {
        let mut asset = Asset::new(AssetKind::Equipment, "Server rack");
        asset.active = active;
        self.repo.insert_asset(&asset).unwrap();
        asset
    }

    /// Active survey with `n` active questions
    pub fn survey(&self, n: usize) -> (Survey, Vec<Question>) {
        let survey = Survey::new("Post-service");
        self.repo.insert_survey(&survey).unwrap();
        let questions: Vec<Question> = (0..n)
            .map(|i| {
                let q = Question::new(survey.id, format!("Question {}", i + 1), i as i32);
                self.repo.insert_question(&q).unwrap();
                q
            })
            .collect();
        (survey, questions)
    }
}
