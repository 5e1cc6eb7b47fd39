//! Configuration provider - cached pricing snapshots
//!
//! Pricing lives in the singleton configuration record. Callers get an
//! immutable `PricingSnapshot`, reloaded once it is older than the TTL or
//! after `invalidate()`.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, Utc};

use crate::domain::result::{Error, Result};
use crate::domain::{Pricing, PricingSnapshot};
use crate::ports::Repository;

use super::boundary::AtBoundary;
use super::logging::{LogEvent, LoggingService};

/// Pricing reader for service-log creation
///
/// Changes made through `update` apply to the next call. Changes written to
/// storage by another process are seen after at most `ttl`; a zero TTL
/// reads storage on every call.
pub struct ConfigurationProvider {
    repository: Arc<dyn Repository>,
    logger: Arc<LoggingService>,
    ttl: Duration,
    cache: Mutex<Option<PricingSnapshot>>,
}

impl ConfigurationProvider {
    pub fn new(repository: Arc<dyn Repository>, logger: Arc<LoggingService>, ttl: Duration) -> Self {
        Self {
            repository,
            logger,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Current pricing, from cache while it is fresh
    pub fn snapshot(&self) -> Result<PricingSnapshot> {
        let mut cache = self.cache()?;
        if let Some(cached) = cache.as_ref() {
            if Utc::now().signed_duration_since(cached.loaded_at) < self.ttl {
                return Ok(cached.clone());
            }
        }

        let pricing = self
            .repository
            .get_pricing()
            .at_boundary(&self.logger, "pricing_load_failed")?
            .ok_or_else(|| Error::not_found("pricing configuration (id 1) is missing"))?;
        let snapshot = PricingSnapshot::new(pricing);
        *cache = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Drop the cached snapshot; the next call reloads
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }

    /// Persist new pricing and return the fresh snapshot
    pub fn update(&self, pricing: Pricing) -> Result<PricingSnapshot> {
        pricing.validate().map_err(Error::invalid)?;
        self.repository
            .save_pricing(&pricing)
            .at_boundary(&self.logger, "pricing_update_failed")?;
        self.invalidate();
        self.logger.record(LogEvent::new("pricing_updated").with_entity("configuration", 1));
        self.snapshot()
    }

    fn cache(&self) -> Result<MutexGuard<'_, Option<PricingSnapshot>>> {
        self.cache
            .lock()
            .map_err(|_| Error::Internal("pricing cache lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::services::test_support::Fixture;

    fn pricing(individual: i64) -> Pricing {
        Pricing {
            price_per_individual_hour: Decimal::from(individual),
            price_per_package_hour: Decimal::from(80),
            commission_percent: Decimal::from(15),
        }
    }

    #[test]
    fn test_snapshot_is_cached_until_invalidated() {
        let fx = Fixture::new();
        let provider =
            ConfigurationProvider::new(fx.repository(), fx.logger.clone(), Duration::minutes(10));

        let first = provider.snapshot().unwrap();
        assert!(first.pricing.price_per_individual_hour.is_zero());

        // Written behind the provider's back
        fx.repo.save_pricing(&pricing(100)).unwrap();
        assert!(provider.snapshot().unwrap().pricing.price_per_individual_hour.is_zero());

        provider.invalidate();
        assert_eq!(
            provider.snapshot().unwrap().pricing.price_per_individual_hour,
            Decimal::from(100)
        );
    }

    #[test]
    fn test_zero_ttl_always_reloads() {
        let fx = Fixture::new();
        let provider = ConfigurationProvider::new(fx.repository(), fx.logger.clone(), Duration::zero());

        provider.snapshot().unwrap();
        fx.repo.save_pricing(&pricing(120)).unwrap();
        assert_eq!(
            provider.snapshot().unwrap().pricing.price_per_individual_hour,
            Decimal::from(120)
        );
    }

    #[test]
    fn test_update_validates_and_refreshes() {
        let fx = Fixture::new();
        let provider =
            ConfigurationProvider::new(fx.repository(), fx.logger.clone(), Duration::minutes(10));
        provider.snapshot().unwrap();

        let mut bad = pricing(100);
        bad.commission_percent = Decimal::from(-1);
        assert!(matches!(provider.update(bad), Err(Error::InvalidArgument(_))));

        let snapshot = provider.update(pricing(100)).unwrap();
        assert_eq!(snapshot.pricing, pricing(100));
        assert_eq!(provider.snapshot().unwrap().pricing, pricing(100));
    }
}
