//! Synchronization settings.
//!
//! [`SyncConfig`] gathers the base names, link mappings, dry-run switches and
//! library routing table used by the orchestrators. It deserializes from TOML
//! with every key optional:
//!
//! ```toml
//! bib_record_base = "FIN01"
//! agent_record_base = "FIN11"
//! urn_resolver_prefix = "http://urn.fi/"
//! no_operation = true
//!
//! [base_map]
//! FIN11 = "FIN11"
//!
//! [urn_base_map]
//! FIN11 = "URN:NBN:fi:au:cn:"
//!
//! [libraries]
//! FIN01 = "bibliographic"
//! FIN11 = "authority"
//! ```

use crate::error::{Result, SyncError};
use crate::link::LinkConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which orchestrator handles changes of a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeHandler {
    /// Changed authority records are propagated to linked records
    Authority,
    /// Changed bibliographic records pull headings from their authorities
    Bibliographic,
}

/// Settings for the synchronization flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base searched for bibliographic records linked to an authority
    pub bib_record_base: String,
    /// Base searched for authority records linked to an authority
    pub agent_record_base: String,
    /// Link mappings
    #[serde(flatten)]
    pub links: LinkConfig,
    /// Dry run for every flow
    pub no_operation: bool,
    /// Dry run for bibliographic changes only
    pub no_operation_bib_change: bool,
    /// Loop suppression window in milliseconds
    pub recent_change_cooldown_ms: u64,
    /// Library -> handler routing table
    pub libraries: IndexMap<String, ChangeHandler>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let base_map = [("FI-ASTERI-S", "FIN10"), ("FI-ASTERI-N", "FIN11")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let libraries = [
            ("FIN01", ChangeHandler::Bibliographic),
            ("FIN11", ChangeHandler::Authority),
            ("FIN19", ChangeHandler::Authority),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        SyncConfig {
            bib_record_base: "FIN01".to_string(),
            agent_record_base: "FIN11".to_string(),
            links: LinkConfig {
                base_map,
                ..LinkConfig::default()
            },
            no_operation: false,
            no_operation_bib_change: false,
            recent_change_cooldown_ms: 20_000,
            libraries,
        }
    }
}

impl SyncConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] for malformed TOML or invalid settings.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SyncConfig =
            toml::from_str(text).map_err(|e| SyncError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the file cannot be read or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Check the settings for values the flows cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SyncError::Config(msg));

        if self.bib_record_base.trim().is_empty() {
            return invalid("bib_record_base is empty".to_string());
        }
        if self.agent_record_base.trim().is_empty() {
            return invalid("agent_record_base is empty".to_string());
        }
        for (link_base, store_base) in &self.links.base_map {
            if link_base.trim().is_empty() || store_base.trim().is_empty() {
                return invalid(format!("base_map entry '{link_base}' -> '{store_base}' has an empty base"));
            }
        }
        if !self.links.urn_base_map.is_empty() && self.links.urn_resolver_prefix.is_empty() {
            return invalid("urn_base_map is set but urn_resolver_prefix is empty".to_string());
        }
        if self.libraries.keys().any(|library| library.trim().is_empty()) {
            return invalid("libraries contains an entry without a base".to_string());
        }
        Ok(())
    }

    /// The link base that maps to a record store base.
    #[must_use]
    pub fn reverse_base(&self, store_base: &str) -> Option<&str> {
        self.links.reverse_base(store_base)
    }

    /// Handler configured for a library.
    #[must_use]
    pub fn handler_for(&self, library: &str) -> Option<ChangeHandler> {
        self.libraries.get(library).copied()
    }

    /// Whether bibliographic changes run dry.
    #[must_use]
    pub fn bib_change_dry_run(&self) -> bool {
        self.no_operation || self.no_operation_bib_change
    }

    /// The loop suppression window.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.recent_change_cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
bib_record_base = "TST01"
agent_record_base = "TST10"
urn_resolver_prefix = "http://urn.fi/"
no_operation_bib_change = true
recent_change_cooldown_ms = 1000

[base_map]
TST10 = "TST10"
FI-ASTERI-N = "FIN11"

[urn_base_map]
TST10 = "URN:NBN:fi:au:cn:"

[libraries]
TST01 = "bibliographic"
TST10 = "authority"
"#;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.bib_record_base, "FIN01");
        assert_eq!(config.agent_record_base, "FIN11");
        assert_eq!(config.cooldown(), Duration::from_secs(20));
        assert_eq!(config.reverse_base("FIN11"), Some("FI-ASTERI-N"));
        assert_eq!(config.handler_for("FIN19"), Some(ChangeHandler::Authority));
        assert_eq!(config.handler_for("FIN01"), Some(ChangeHandler::Bibliographic));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let config = SyncConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.bib_record_base, "TST01");
        assert_eq!(config.links.urn_resolver_prefix, "http://urn.fi/");
        assert_eq!(config.links.urn_base_map["TST10"], "URN:NBN:fi:au:cn:");
        assert_eq!(config.reverse_base("FIN11"), Some("FI-ASTERI-N"));
        assert_eq!(config.cooldown(), Duration::from_millis(1000));
        assert!(!config.no_operation);
        assert!(config.bib_change_dry_run());
        assert_eq!(config.handler_for("TST10"), Some(ChangeHandler::Authority));
        assert_eq!(config.handler_for("FIN01"), None);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        assert_eq!(SyncConfig::from_toml_str("").unwrap(), SyncConfig::default());
    }

    #[test]
    fn test_unknown_handler_is_rejected() {
        let err = SyncConfig::from_toml_str("[libraries]\nFIN01 = \"holdings\"\n").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = SyncConfig::default();
        config.bib_record_base = String::new();
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.links.urn_base_map.insert("FIN11".to_string(), "URN:NBN:fi:au:cn:".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("urn_resolver_prefix"));

        let mut config = SyncConfig::default();
        config.links.base_map.insert("FIN10".to_string(), " ".to_string());
        assert!(config.validate().is_err());

        let mut config = SyncConfig::default();
        config.libraries.insert(String::new(), ChangeHandler::Authority);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = SyncConfig::from_file(file.path()).unwrap();
        assert_eq!(config.agent_record_base, "TST10");

        let err = SyncConfig::from_file("/nonexistent/heading-sync.toml").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
