//! Run configuration
//!
//! Loaded from an optional TOML file; every field has a working default so
//! the calculator runs without one. The priority table drives which leg of
//! a two-currency trade is valued directly (see `rates::valuation`).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Currency all values are reported in. Always the highest-priority
    /// valuation leg.
    pub base_currency: String,

    /// Explicit valuation priorities per currency; higher wins. Currencies
    /// absent from the table fall back to `default_priority`.
    pub priorities: HashMap<String, i32>,

    /// Priority assumed for currencies not listed in `priorities`.
    pub default_priority: i32,

    /// Whether profit realized by paying down a negative pool (acquisition
    /// into a debt account) counts as chargeable gain. The credit-side
    /// disposal treatment is always fully chargeable; the debit side is a
    /// policy choice, off by default.
    pub debit_pool_chargeable: bool,
}

impl Default for Config {
    fn default() -> Self {
        let mut priorities = HashMap::new();
        priorities.insert("USD".to_string(), 20);
        priorities.insert("EUR".to_string(), 10);
        Self {
            base_currency: "GBP".to_string(),
            priorities,
            default_priority: 0,
            debit_pool_chargeable: false,
        }
    }
}

impl Config {
    /// Load from a TOML file, or fall back to defaults when no path given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {:?}", path))?;
                let config: Config = toml::from_str(&text)
                    .with_context(|| format!("failed to parse config file {:?}", path))?;
                info!("Loaded configuration from {:?}", path);
                Ok(config)
            }
            None => Ok(Config::default()),
        }
    }

    /// Priority of a currency for valuation-leg selection, base excluded
    /// (the base currency is handled above any table value).
    pub fn priority(&self, currency: &str) -> i32 {
        self.priorities
            .get(currency)
            .copied()
            .unwrap_or(self.default_priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_currency, "GBP");
        assert!(!config.debit_pool_chargeable);
        assert!(config.priority("USD") > config.priority("EUR"));
        assert_eq!(config.priority("XLM"), config.default_priority);
    }

    #[test]
    fn test_parse_toml() {
        let text = r#"
            base_currency = "EUR"
            default_priority = -1
            debit_pool_chargeable = true

            [priorities]
            USD = 50
            BTC = 5
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.base_currency, "EUR");
        assert_eq!(config.priority("BTC"), 5);
        assert_eq!(config.priority("DOGE"), -1);
        assert!(config.debit_pool_chargeable);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("base_curency = \"EUR\"");
        assert!(result.is_err());
    }
}
