//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "app": {
//!     "baseUrl": "https://service.example.com",
//!     "linkValidityMinutes": 120,
//!     "pricingCacheTtlSeconds": 60
//!   }
//! }
//! ```
//! Keys this crate does not manage are kept untouched on save.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_LINK_VALIDITY_MINUTES: i64 = 120;
pub const DEFAULT_PRICING_CACHE_TTL_SECONDS: i64 = 60;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    link_validity_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pricing_cache_ttl_seconds: Option<i64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Bitacora configuration (resolved view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL that remote signature links are built on
    pub base_url: String,
    /// Minutes a remote signature link stays valid
    pub link_validity_minutes: i64,
    /// Seconds a pricing snapshot is served before reloading
    pub pricing_cache_ttl_seconds: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            link_validity_minutes: DEFAULT_LINK_VALIDITY_MINUTES,
            pricing_cache_ttl_seconds: DEFAULT_PRICING_CACHE_TTL_SECONDS,
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// Environment overrides (for deployments and CI):
    /// - BITACORA_BASE_URL
    /// - BITACORA_LINK_VALIDITY_MINUTES
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;
        let defaults = Self::default();

        let base_url = std::env::var("BITACORA_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or(raw.app.base_url)
            .unwrap_or(defaults.base_url);

        let link_validity_minutes = match std::env::var("BITACORA_LINK_VALIDITY_MINUTES") {
            Ok(value) => value
                .trim()
                .parse()
                .with_context(|| format!("BITACORA_LINK_VALIDITY_MINUTES is not a number: {}", value))?,
            Err(_) => raw
                .app
                .link_validity_minutes
                .unwrap_or(defaults.link_validity_minutes),
        };

        let config = Self {
            base_url,
            link_validity_minutes,
            pricing_cache_ttl_seconds: raw
                .app
                .pricing_cache_ttl_seconds
                .unwrap_or(defaults.pricing_cache_ttl_seconds),
        };
        config.validate()?;
        Ok(config)
    }

    /// Save config to the data directory
    /// Preserves other settings that this crate doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        self.validate()?;
        let settings_path = data_dir.join("settings.json");

        let mut settings = read_settings(data_dir)?;
        settings.app.base_url = Some(self.base_url.clone());
        settings.app.link_validity_minutes = Some(self.link_validity_minutes);
        settings.app.pricing_cache_ttl_seconds = Some(self.pricing_cache_ttl_seconds);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("Base URL must use http or https: {}", self.base_url));
        }
        if self.link_validity_minutes <= 0 {
            return Err(anyhow!("Link validity must be a positive number of minutes"));
        }
        if self.pricing_cache_ttl_seconds < 0 {
            return Err(anyhow!("Pricing cache TTL cannot be negative"));
        }
        Ok(())
    }

    pub fn link_validity(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.link_validity_minutes)
    }

    pub fn pricing_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pricing_cache_ttl_seconds)
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join("settings.json");
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    Ok(serde_json::from_str(&content).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert_eq!(config.link_validity_minutes, DEFAULT_LINK_VALIDITY_MINUTES);
        assert_eq!(config.pricing_cache_ttl_seconds, DEFAULT_PRICING_CACHE_TTL_SECONDS);
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"app": {"theme": "dark", "linkValidityMinutes": 30}, "extra": {"a": 1}}"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        assert_eq!(config.pricing_cache_ttl_seconds, DEFAULT_PRICING_CACHE_TTL_SECONDS);
        config.pricing_cache_ttl_seconds = 5;
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("settings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["app"]["theme"], "dark");
        assert_eq!(saved["app"]["pricingCacheTtlSeconds"], 5);
        assert_eq!(saved["extra"]["a"], 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.base_url = "ftp://files.example.com".to_string();
        assert!(config.validate().is_err());

        config.base_url = DEFAULT_BASE_URL.to_string();
        config.link_validity_minutes = 0;
        assert!(config.validate().is_err());
    }
}
