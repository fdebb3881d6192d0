//! Process configuration, read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `ATELIER_BIND_ADDR` | `0.0.0.0:8080` |
//! | `ATELIER_LOG_FORMAT` | `json` (`json` or `pretty`) |
//! | `ATELIER_SIZE_CATALOG` | built-in tables |
//!
//! `ATELIER_SIZE_CATALOG` points at a JSON file with `us_standard`,
//! `br_standard` and `shoe_numbering` arrays of labels.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;

use atelier_observability::LogFormat;
use atelier_sizing::SizeCatalog;

pub const BIND_ADDR_VAR: &str = "ATELIER_BIND_ADDR";
pub const LOG_FORMAT_VAR: &str = "ATELIER_LOG_FORMAT";
pub const SIZE_CATALOG_VAR: &str = "ATELIER_SIZE_CATALOG";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizingConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub catalog: SizeCatalog,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_format: LogFormat::default(),
            catalog: SizeCatalog::default(),
        }
    }
}

impl SizingConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_raw = lookup(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse()
            .with_context(|| format!("{BIND_ADDR_VAR}='{bind_raw}' is not a socket address"))?;

        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(raw) => raw.parse().with_context(|| format!("invalid {LOG_FORMAT_VAR}"))?,
            None => LogFormat::default(),
        };

        let catalog = match lookup(SIZE_CATALOG_VAR) {
            Some(path) => load_catalog(Path::new(path.trim()))?,
            None => SizeCatalog::default(),
        };

        Ok(Self {
            bind_addr,
            log_format,
            catalog,
        })
    }
}

/// Load and validate a size catalog from a JSON file.
pub fn load_catalog(path: &Path) -> anyhow::Result<SizeCatalog> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading size catalog {}", path.display()))?;
    parse_catalog(&raw).with_context(|| format!("loading size catalog {}", path.display()))
}

fn parse_catalog(raw: &str) -> anyhow::Result<SizeCatalog> {
    let catalog: SizeCatalog = serde_json::from_str(raw).context("malformed catalog JSON")?;
    catalog.validate()?;
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = SizingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SizingConfig::default());
    }

    #[test]
    fn reads_bind_addr_and_log_format() {
        let config = SizingConfig::from_lookup(lookup(&[
            (BIND_ADDR_VAR, "127.0.0.1:9000"),
            (LOG_FORMAT_VAR, "pretty"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_garbage_values() {
        assert!(SizingConfig::from_lookup(lookup(&[(BIND_ADDR_VAR, "nowhere")])).is_err());
        assert!(SizingConfig::from_lookup(lookup(&[(LOG_FORMAT_VAR, "xml")])).is_err());
        assert!(
            SizingConfig::from_lookup(lookup(&[(SIZE_CATALOG_VAR, "/definitely/not/here.json")]))
                .is_err()
        );
    }

    #[test]
    fn catalog_file_is_validated() {
        let ok = parse_catalog(
            r#"{"us_standard":["S","M"],"br_standard":["P"],"shoe_numbering":["40","41"]}"#,
        )
        .unwrap();
        assert_ne!(ok, SizeCatalog::default());

        let duplicate = parse_catalog(
            r#"{"us_standard":["S","S"],"br_standard":["P"],"shoe_numbering":["40"]}"#,
        );
        assert!(duplicate.is_err());

        let empty = parse_catalog(r#"{"us_standard":[],"br_standard":["P"],"shoe_numbering":["40"]}"#);
        assert!(empty.is_err());
    }
}
