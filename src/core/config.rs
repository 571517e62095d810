//! Telemetry configuration and its JSON persistence
//!
//! The on-disk format keeps the field names and the legacy inverted level
//! numbering of earlier deployments; see [`crate::core::level`]. Runtime-only
//! fields (session GUID, version, chain id, file path) are never persisted.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::error::{Result, TelemetryError};
use super::level::Level;

/// Default file name for the telemetry config
pub const TELEMETRY_CONFIG_FILENAME: &str = "logging.config";

/// Shared collector defaults, blanked on save and refilled on load.
/// These are well-known ingestion credentials, not a secret.
const DEFAULT_USERNAME: &str = "telemetry";
const DEFAULT_PASSWORD: &str = "telemetry";

const MAX_NAME_LENGTH: usize = 255;

/// Configuration of telemetry shipping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Enable remote telemetry
    #[serde(rename = "Enable")]
    pub enable: bool,
    /// Echo telemetry events into the local log
    #[serde(rename = "SendToLog")]
    pub send_to_log: bool,
    #[serde(rename = "URI")]
    pub uri: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "GUID")]
    pub guid: String,
    /// Minimum severity to ship; custom-marshalled via the legacy numbering
    #[serde(skip)]
    pub min_log_level: Level,
    /// Minimum severity at which log history is attached; custom-marshalled
    #[serde(skip)]
    pub report_history_level: Level,
    /// Path this config was loaded from, if any
    #[serde(skip)]
    pub file_path: Option<PathBuf>,
    #[serde(skip)]
    pub chain_id: String,
    #[serde(skip)]
    pub session_guid: String,
    #[serde(skip)]
    pub version: String,
    #[serde(rename = "UserName")]
    pub user_name: String,
    #[serde(rename = "Password")]
    pub password: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enable: false,
            send_to_log: false,
            uri: String::new(),
            name: String::new(),
            guid: Uuid::new_v4().to_string(),
            min_log_level: Level::Warn,
            report_history_level: Level::Warn,
            file_path: None,
            chain_id: String::new(),
            session_guid: String::new(),
            version: String::new(),
            user_name: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

/// Persisted form: the config plus the levels in the legacy numbering
#[derive(Serialize, Deserialize)]
struct PersistedTelemetryConfig {
    #[serde(flatten)]
    config: TelemetryConfig,
    #[serde(rename = "MinLogLevel", default = "default_persisted_level")]
    min_log_level: u32,
    #[serde(rename = "ReportHistoryLevel", default = "default_persisted_level")]
    report_history_level: u32,
}

fn default_persisted_level() -> u32 {
    Level::Warn.to_config_value()
}

impl TelemetryConfig {
    /// A fresh configuration with a generated GUID and telemetry disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let persisted: PersistedTelemetryConfig = serde_json::from_str(&data)?;

        let mut cfg = persisted.config;
        // Malformed level codes degrade to Debug rather than failing the load.
        cfg.min_log_level =
            Level::from_config_value(persisted.min_log_level).unwrap_or(Level::Debug);
        cfg.report_history_level =
            Level::from_config_value(persisted.report_history_level).unwrap_or(Level::Debug);
        cfg.file_path = Some(path.to_path_buf());

        if cfg.user_name.is_empty() && cfg.password.is_empty() {
            cfg.user_name = DEFAULT_USERNAME.to_string();
            cfg.password = DEFAULT_PASSWORD.to_string();
        }

        if !cfg.name.is_empty() {
            cfg.name = sanitize_telemetry_string(&cfg.name, 1);
        }

        Ok(cfg)
    }

    /// Load a config, falling back to defaults on any failure.
    ///
    /// Startup proceeds with telemetry disabled rather than aborting; the
    /// error is returned alongside the usable default for the caller to log.
    pub fn load_or_default(path: &Path) -> (Self, Option<TelemetryError>) {
        match Self::load(path) {
            Ok(cfg) => (cfg, None),
            Err(err) => (Self::default(), Some(err)),
        }
    }

    /// Load the config at `path`, or create, save and return a fresh one.
    ///
    /// Returns the config and whether it had to be created.
    pub fn ensure(path: &Path) -> Result<(Self, bool)> {
        match Self::load(path) {
            Ok(cfg) => Ok((cfg, false)),
            Err(_) => {
                let mut cfg = Self::default();
                cfg.file_path = Some(path.to_path_buf());
                cfg.save(path)?;
                Ok((cfg, true))
            }
        }
    }

    /// Save the config to `path` in the persisted JSON format.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut config = self.clone();
        config.file_path = None;

        // Built-in defaults are not worth persisting; blank them so rotating
        // the shared credentials doesn't require touching every config file.
        if config.user_name == DEFAULT_USERNAME && config.password == DEFAULT_PASSWORD {
            config.user_name = String::new();
            config.password = String::new();
        }

        let persisted = PersistedTelemetryConfig {
            min_log_level: config.min_log_level.to_config_value(),
            report_history_level: config.report_history_level.to_config_value(),
            config,
        };

        let data = serde_json::to_string(&persisted)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Host GUID for telemetry: `GUID[:Name]`, the name part only when
    /// telemetry is enabled and a name is set.
    pub fn host_guid(&self) -> String {
        let mut ret = self.guid.clone();
        if self.enable && !self.name.is_empty() {
            ret.push(':');
            ret.push_str(&self.name);
        }
        ret
    }

    /// Anonymized identifier distinguishing instances sharing a GUID.
    ///
    /// A double SHA-256 of the GUID, base64-encoded and truncated; carries
    /// no personally identifiable information.
    pub fn instance_name(&self) -> String {
        let first = Sha256::digest(self.guid.as_bytes());
        let second = Sha256::digest(first);
        let mut encoded = BASE64.encode(second);
        encoded.truncate(16);
        encoded
    }
}

/// Apply an environment-style override value to `enable`.
///
/// `"1"`/`"true"` enable, `"0"`/`"false"` disable, anything else leaves the
/// config untouched. Returns the resulting enable flag.
pub fn telemetry_override(value: &str, cfg: &mut TelemetryConfig) -> bool {
    match value.to_lowercase().as_str() {
        "1" | "true" => cfg.enable = true,
        "0" | "false" => cfg.enable = false,
        _ => {}
    }
    cfg.enable
}

/// Truncate a user-supplied string to a bounded size for telemetry use.
pub fn sanitize_telemetry_string(input: &str, max_parts: usize) -> String {
    let max_reasonable_size = max_parts * MAX_NAME_LENGTH + max_parts.saturating_sub(1);
    if input.len() > max_reasonable_size {
        let mut end = max_reasonable_size;
        // Stay on a char boundary.
        while end > 0 && !input.is_char_boundary(end) {
            end -= 1;
        }
        input[..end].to_string()
    } else {
        input.to_string()
    }
}
