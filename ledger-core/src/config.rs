//! Configuration for the ledger stack

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Ledger configuration
    pub ledger: LedgerConfig,

    /// Optimizer configuration
    pub optimizer: OptimizerConfig,

    /// Rulepack configuration
    pub rules: RulesConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "yield-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger: LedgerConfig::default(),
            optimizer: OptimizerConfig::default(),
            rules: RulesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Actor mailbox capacity
    pub mailbox_capacity: usize,

    /// JSON Lines audit log (disabled when unset)
    pub audit_log_path: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            audit_log_path: None,
        }
    }
}

/// Optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Basis category for rules that name none
    pub default_basis_category: String,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            default_basis_category: crate::types::DEFAULT_BASIS_CATEGORY.to_string(),
        }
    }
}

/// Rulepack configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rulepack version, fingerprinted into every claim
    pub rulepack_version: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            rulepack_version: "v2026.1.1".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from `YIELD_LEDGER_*` variables
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> crate::Result<()> {
        if let Some(path) = lookup("YIELD_LEDGER_AUDIT_LOG") {
            self.ledger.audit_log_path = Some(PathBuf::from(path));
        }

        if let Some(capacity) = lookup("YIELD_LEDGER_MAILBOX_CAPACITY") {
            self.ledger.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid YIELD_LEDGER_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        if let Some(category) = lookup("YIELD_LEDGER_DEFAULT_BASIS_CATEGORY") {
            self.optimizer.default_basis_category = category;
        }

        if let Some(version) = lookup("YIELD_LEDGER_RULEPACK_VERSION") {
            self.rules.rulepack_version = version;
        }

        if let Some(filter) = lookup("YIELD_LEDGER_LOG") {
            self.logging.filter = filter;
        }

        if let Some(json) = lookup("YIELD_LEDGER_LOG_JSON") {
            self.logging.json = matches!(json.as_str(), "1" | "true" | "yes");
        }

        self.validate()
    }

    fn validate(&self) -> crate::Result<()> {
        if self.ledger.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "ledger.mailbox_capacity must be positive".to_string(),
            ));
        }
        if self.optimizer.default_basis_category.is_empty() {
            return Err(crate::Error::Config(
                "optimizer.default_basis_category must not be empty".to_string(),
            ));
        }
        if self.rules.rulepack_version.is_empty() {
            return Err(crate::Error::Config(
                "rules.rulepack_version must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "yield-ledger");
        assert_eq!(config.optimizer.default_basis_category, "GENERAL");
        assert_eq!(config.ledger.mailbox_capacity, 1000);
        assert!(config.ledger.audit_log_path.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [ledger]
            audit_log_path = "/var/lib/yield/audit_trail.jsonl"

            [rules]
            rulepack_version = "v2027.0.0"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.ledger.audit_log_path,
            Some(PathBuf::from("/var/lib/yield/audit_trail.jsonl"))
        );
        assert_eq!(config.ledger.mailbox_capacity, 1000);
        assert_eq!(config.rules.rulepack_version, "v2027.0.0");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml("[ledger]\nmailbox_capacity = 0").is_err());
        assert!(Config::from_toml("not = [valid").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("YIELD_LEDGER_MAILBOX_CAPACITY", "8"),
            ("YIELD_LEDGER_DEFAULT_BASIS_CATEGORY", "EQUIPMENT"),
            ("YIELD_LEDGER_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.ledger.mailbox_capacity, 8);
        assert_eq!(config.optimizer.default_basis_category, "EQUIPMENT");
        assert!(config.logging.json);

        let mut bad = Config::default();
        assert!(bad
            .apply_env(|key| (key == "YIELD_LEDGER_MAILBOX_CAPACITY").then(|| "many".to_string()))
            .is_err());
    }
}
