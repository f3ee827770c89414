//! Configuration parsing for the sink runner.
//!
//! All sinks are read from a single JSON config file. The top-level structure
//! contains logging metadata and a `sinks` array where each entry describes
//! one destination (one event kind into one collection).
//!
//! # Example config
//!
//! ```json
//! {
//!   "logging": { "module_name": "mongo_sink", "log_path": "/tmp/log" },
//!   "sinks": [
//!     { "kind": "trades", "db": "marketdata" },
//!     { "kind": "book", "db": "marketdata", "snapshot_interval": 500 },
//!     { "kind": "funding", "db": "marketdata", "host": "10.0.0.5",
//!       "username": "feed", "password": "secret", "numeric_type": "float" }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use bson::Bson;
use serde::Deserialize;

use crate::error::K4Error;
use crate::queue::{DEFAULT_MAX_BATCH, DEFAULT_QUEUE_CAPACITY};
use crate::types::{EventKind, NumericFormat, NumericType};

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Logging metadata (module name, log path).
    pub logging: Option<LoggingMeta>,

    /// One entry per sink instance.
    pub sinks: Vec<MongoSinkConfig>,
}

impl AppConfig {
    /// Validate every sink entry, reporting the first failure with its index.
    pub fn validate(&self) -> Result<(), K4Error> {
        if self.sinks.is_empty() {
            return Err(K4Error::Config("no sinks configured".into()));
        }
        for (idx, sink) in self.sinks.iter().enumerate() {
            sink.validate()
                .map_err(|e| K4Error::Config(format!("sinks[{idx}] ({}): {e}", sink.kind)))?;
        }
        Ok(())
    }

    pub fn module_name(&self) -> String {
        self.logging
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| "k4-sink".to_string())
    }

    pub fn log_path(&self) -> Option<String> {
        self.logging.as_ref().and_then(|m| m.log_path.clone())
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().and_then(|m| m.json).unwrap_or(false)
    }
}

/// Logging metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
    /// Write the log file as JSON lines instead of plain text.
    pub json: Option<bool>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    27017
}

/// A single MongoDB sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoSinkConfig {
    /// Event kind this sink accepts.
    pub kind: EventKind,

    /// Destination database name.
    pub db: String,

    /// Server host (default: `127.0.0.1`).
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port (default: 27017).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Credentials. Authentication is used only when both are set.
    pub username: Option<String>,
    pub password: Option<String>,

    /// Collection name override. Defaults to the kind's collection.
    pub key: Option<String>,

    /// Substitute for absent values, as a JSON value (e.g. `0`, `"NA"`).
    pub none_to: Option<serde_json::Value>,

    /// Decimal rendering (default: `"str"`).
    #[serde(default)]
    pub numeric_type: NumericType,

    /// Funding / open interest: seconds between stored updates (default 60).
    /// Book: deltas between full snapshots (default 1000).
    pub snapshot_interval: Option<u64>,

    /// Book only: store full snapshots instead of deltas.
    #[serde(default)]
    pub snapshots_only: bool,

    /// Queue capacity in records (default: 10_000).
    pub queue_capacity: Option<usize>,

    /// Maximum records per bulk insert (default: 1_000).
    pub max_batch: Option<usize>,
}

impl MongoSinkConfig {
    /// Minimal config for `kind` into database `db`, everything else default.
    pub fn new(kind: EventKind, db: impl Into<String>) -> Self {
        Self {
            kind,
            db: db.into(),
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            key: None,
            none_to: None,
            numeric_type: NumericType::default(),
            snapshot_interval: None,
            snapshots_only: false,
            queue_capacity: None,
            max_batch: None,
        }
    }

    /// Destination collection: `key` if set, else the kind's default.
    pub fn collection(&self) -> &str {
        self.key.as_deref().unwrap_or(self.kind.default_collection())
    }

    /// Snapshot interval for kinds that use one; `None` for the rest.
    pub fn effective_snapshot_interval(&self) -> Option<u64> {
        self.kind
            .default_snapshot_interval()
            .map(|default| self.snapshot_interval.unwrap_or(default))
    }

    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn effective_max_batch(&self) -> usize {
        self.max_batch.unwrap_or(DEFAULT_MAX_BATCH)
    }

    /// `(username, password)` when both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }

    /// Value rendering options derived from `numeric_type` and `none_to`.
    pub fn numeric_format(&self) -> Result<NumericFormat, K4Error> {
        let none_to = match &self.none_to {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(
                bson::to_bson(v).map_err(|e| K4Error::Config(format!("none_to: {e}")))?,
            ),
        };
        Ok(NumericFormat::new(self.numeric_type, none_to))
    }

    pub fn validate(&self) -> Result<(), K4Error> {
        if self.db.trim().is_empty() {
            return Err(K4Error::Config("db must not be empty".into()));
        }
        if self.host.trim().is_empty() {
            return Err(K4Error::Config("host must not be empty".into()));
        }
        if matches!(self.key.as_deref(), Some(k) if k.trim().is_empty()) {
            return Err(K4Error::Config("key must not be empty".into()));
        }
        if self.queue_capacity == Some(0) {
            return Err(K4Error::Config("queue_capacity must be > 0".into()));
        }
        if self.max_batch == Some(0) {
            return Err(K4Error::Config("max_batch must be > 0".into()));
        }
        if let Some(Bson::Document(_) | Bson::Array(_)) = self.numeric_format()?.none_to {
            return Err(K4Error::Config("none_to must be a scalar".into()));
        }
        Ok(())
    }
}

/// Load, parse and validate a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: AppConfig =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AppConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn defaults_applied() {
        let cfg = parse(r#"{"sinks":[{"kind":"trades","db":"marketdata"}]}"#);
        let s = &cfg.sinks[0];
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.port, 27017);
        assert_eq!(s.collection(), "trades");
        assert_eq!(s.numeric_type, NumericType::Str);
        assert_eq!(s.effective_snapshot_interval(), None);
        assert!(s.credentials().is_none());
        assert_eq!(cfg.module_name(), "k4-sink");
        cfg.validate().unwrap();
    }

    #[test]
    fn kind_specific_intervals() {
        let cfg = parse(
            r#"{"sinks":[
                {"kind":"funding","db":"d"},
                {"kind":"book","db":"d"},
                {"kind":"book","db":"d","snapshot_interval":5,"snapshots_only":true}
            ]}"#,
        );
        assert_eq!(cfg.sinks[0].effective_snapshot_interval(), Some(60));
        assert_eq!(cfg.sinks[1].effective_snapshot_interval(), Some(1000));
        assert_eq!(cfg.sinks[2].effective_snapshot_interval(), Some(5));
        assert!(cfg.sinks[2].snapshots_only);
    }

    #[test]
    fn key_overrides_collection() {
        let cfg = parse(r#"{"sinks":[{"kind":"candles","db":"d","key":"bars_1m"}]}"#);
        assert_eq!(cfg.sinks[0].collection(), "bars_1m");
    }

    #[test]
    fn credentials_need_both() {
        let mut s = MongoSinkConfig::new(EventKind::Trades, "d");
        s.username = Some("u".into());
        assert!(s.credentials().is_none());
        s.password = Some("p".into());
        assert_eq!(s.credentials(), Some(("u", "p")));
    }

    #[test]
    fn none_to_becomes_bson() {
        let cfg = parse(r#"{"sinks":[{"kind":"ticker","db":"d","none_to":"NA","numeric_type":"float"}]}"#);
        let fmt = cfg.sinks[0].numeric_format().unwrap();
        assert_eq!(fmt.none_to, Some(Bson::String("NA".into())));
        assert_eq!(fmt.numeric_type, NumericType::Float);
    }

    #[test]
    fn validation_failures() {
        let cfg = parse(r#"{"sinks":[{"kind":"trades","db":"  "}]}"#);
        assert!(matches!(cfg.validate(), Err(K4Error::Config(_))));

        let cfg = parse(r#"{"sinks":[{"kind":"trades","db":"d","none_to":{"a":1}}]}"#);
        assert!(cfg.validate().is_err());

        let cfg = parse(r#"{"sinks":[{"kind":"trades","db":"d","max_batch":0}]}"#);
        assert!(cfg.validate().is_err());

        let cfg = parse(r#"{"sinks":[]}"#);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_kind_rejected() {
        assert!(serde_json::from_str::<AppConfig>(r#"{"sinks":[{"kind":"orders","db":"d"}]}"#).is_err());
    }
}
