//! Engine configuration
//!
//! Deserialised from JSON with serde defaults, so hosts only pass what they
//! override:
//! ```json
//! { "domains_enabled": ["solscan.io"], "debounce_ms": 250 }
//! ```

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dom::{Denylist, DEFAULT_DENYLIST};
use crate::error::{Error, Result};
use crate::logging;
use crate::scheduler::{SchedulerTiming, DEFAULT_DEBOUNCE_MS, DEFAULT_SETTLE_MS};

/// How matched regions are rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceMode {
    /// Replace visible text in place
    #[default]
    Inline,
}

impl fmt::Display for ReplaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => write!(f, "inline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub replace_mode: ReplaceMode,
    /// Hosts the engine attaches to. Each entry matches itself and any
    /// subdomain. Empty means every host.
    pub domains_enabled: Vec<String>,
    pub debounce_ms: u64,
    pub settle_ms: u64,
    /// Simple selectors (`tag` or `.class`) for regions never scanned
    pub denylist: Vec<String>,
    /// `log` level name; unknown names mean `info`
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            replace_mode: ReplaceMode::Inline,
            domains_enabled: Vec::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.parsed_denylist()?;
        if self.domains_enabled.iter().any(|d| normalize_host(d).is_empty()) {
            return Err(Error::Config("empty entry in domains_enabled".to_string()));
        }
        Ok(())
    }

    pub fn parsed_denylist(&self) -> Result<Denylist> {
        Denylist::parse(self.denylist.iter().map(String::as_str))
    }

    pub fn timing(&self) -> SchedulerTiming {
        SchedulerTiming {
            debounce_ms: self.debounce_ms,
            settle_ms: self.settle_ms,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        logging::parse_level(&self.log_level)
    }

    /// True if the engine should attach on `host`
    pub fn is_enabled_for(&self, host: &str) -> bool {
        if self.domains_enabled.is_empty() {
            return true;
        }
        let host = normalize_host(host);
        self.domains_enabled.iter().any(|domain| {
            let domain = normalize_host(domain);
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = EngineConfig::from_json(r#"{ "debounce_ms": 250 }"#).unwrap();
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.settle_ms, DEFAULT_SETTLE_MS);
        assert_eq!(config.replace_mode, ReplaceMode::Inline);
        assert!(config.denylist.iter().any(|s| s == ".raw-data"));
        assert_eq!(config.log_level(), LevelFilter::Info);
    }

    #[test]
    fn test_log_level_from_json() {
        let config = EngineConfig::from_json(r#"{ "log_level": "debug" }"#).unwrap();
        assert_eq!(config.log_level(), LevelFilter::Debug);
        let config = EngineConfig::from_json(r#"{ "log_level": "chatty" }"#).unwrap();
        assert_eq!(config.log_level(), LevelFilter::Info);
    }

    #[test]
    fn test_unknown_replace_mode_rejected() {
        let err = EngineConfig::from_json(r#"{ "replace_mode": "tooltip" }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_bad_denylist_rejected() {
        assert!(EngineConfig::from_json(r#"{ "denylist": ["div code"] }"#).is_err());
        assert!(EngineConfig::from_json(r#"{ "denylist": ["kbd", ".hex"] }"#).is_ok());
    }

    #[test]
    fn test_host_matching() {
        let config = EngineConfig {
            domains_enabled: vec!["solscan.io".into(), "Explorer.Example.com".into()],
            ..Default::default()
        };
        assert!(config.is_enabled_for("solscan.io"));
        assert!(config.is_enabled_for("beta.solscan.io"));
        assert!(config.is_enabled_for("explorer.example.com."));
        assert!(!config.is_enabled_for("notsolscan.io"));
        assert!(!config.is_enabled_for("example.com"));
        assert!(EngineConfig::default().is_enabled_for("anything.test"));
    }
}
