//! Library configuration.
//!
//! Defaults come from [`AdafConfig::default`], which sizes the link cache
//! from the open-file limit. `from_env()` overlays environment variables and
//! `read_from()` loads a JSON file; missing JSON fields keep their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::IndexLimit;
use crate::resource::HandleBudget;

/// Environment variable overriding [`AdafConfig::link_cache_capacity`].
pub const ENV_LINK_CACHE_CAPACITY: &str = "ADAF_LINK_CACHE_CAPACITY";

/// Environment variable overriding [`AdafConfig::link_external`].
pub const ENV_LINK_EXTERNAL: &str = "ADAF_LINK_EXTERNAL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdafConfig {
    /// Bound on linked (evictable) file handles.
    pub link_cache_capacity: usize,
    /// Save unmodified rasters stored in other files as links.
    pub link_external: bool,
    /// Attributes kept in the index persisted by `sync()`.
    pub index_limit: IndexLimit,
    /// Package id written to files that don't have one yet.
    pub package_id: String,
}

impl Default for AdafConfig {
    fn default() -> Self {
        AdafConfig {
            link_cache_capacity: HandleBudget::detect().link_cache_capacity(),
            link_external: true,
            index_limit: IndexLimit::persisted(),
            package_id: concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl AdafConfig {
    /// Defaults overlaid with `ADAF_*` environment variables. Unparsable
    /// values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(capacity) = env_value(ENV_LINK_CACHE_CAPACITY, |v| v.parse::<usize>().ok()) {
            config.link_cache_capacity = capacity.max(1);
        }
        if let Some(link) = env_value(ENV_LINK_EXTERNAL, parse_flag) {
            config.link_external = link;
        }
        config
    }

    /// Read config from a JSON file. Returns None if the file doesn't exist.
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(Some(config))
    }

    /// Write config as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn env_value<T>(name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        tracing::warn!(var = name, value = %raw, "Ignoring unparsable environment value");
    }
    parsed
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_round_trip_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adaf.json");
        assert_eq!(AdafConfig::read_from(&path).unwrap(), None);

        let config = AdafConfig {
            link_cache_capacity: 7,
            link_external: false,
            ..AdafConfig::default()
        };
        config.write_to(&path).unwrap();
        assert_eq!(AdafConfig::read_from(&path).unwrap(), Some(config));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adaf.json");
        std::fs::write(&path, r#"{"link_external": false}"#).unwrap();
        let config = AdafConfig::read_from(&path).unwrap().unwrap();
        assert!(!config.link_external);
        assert_eq!(config.index_limit, IndexLimit::persisted());
        assert!(config.package_id.starts_with("adaf "));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
