//! Configuration system: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{NetpanelError, Result};
use crate::logger::jsonl::JsonlConfig;

/// Full netpanel configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub presenter: PresenterConfig,
    pub preferences: PreferencesConfig,
    pub logging: LoggingConfig,
    pub scale: ScaleConfig,
}

/// History sizes and channel depths for a presenter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PresenterConfig {
    /// Dashboard identity used when none is given on the command line.
    pub dashboard: String,
    pub latency_window: usize,
    pub chart_window: usize,
    pub reachability_window: usize,
    pub reset_notice_capacity: usize,
    pub source_request_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreferencesConfig {
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub channel_capacity: usize,
}

/// Percentage scaling needs a link capacity the monitoring source does not report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ScaleConfig {
    /// Bytes per second that count as 100%.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_capacity: Option<u64>,
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            dashboard: "Network".to_string(),
            latency_window: 90,
            chart_window: 120,
            reachability_window: 90,
            reset_notice_capacity: 16,
            source_request_capacity: 8,
        }
    }
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            file: config_dir().join("preferences.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let jsonl = JsonlConfig::default();
        Self {
            enabled: true,
            jsonl_path: jsonl.path,
            max_size_bytes: jsonl.max_size_bytes,
            max_rotated_files: jsonl.max_rotated_files,
            channel_capacity: 1024,
        }
    }
}

impl LoggingConfig {
    #[must_use]
    pub fn jsonl(&self) -> JsonlConfig {
        JsonlConfig {
            path: self.jsonl_path.clone(),
            max_size_bytes: self.max_size_bytes,
            max_rotated_files: self.max_rotated_files,
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[NETPANEL-CONFIG] WARNING: HOME not set, falling back to /tmp");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn config_dir() -> PathBuf {
    home_dir().join(".config").join("netpanel")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf)
                .map_err(|source| NetpanelError::io(&path_buf, source))?;
            toml::from_str(&raw)?
        } else if path.is_some() {
            return Err(NetpanelError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // presenter
        if let Some(raw) = lookup("NETPANEL_DASHBOARD") {
            self.presenter.dashboard = raw;
        }
        set_usize(&lookup, "NETPANEL_LATENCY_WINDOW", &mut self.presenter.latency_window)?;
        set_usize(&lookup, "NETPANEL_CHART_WINDOW", &mut self.presenter.chart_window)?;
        set_usize(
            &lookup,
            "NETPANEL_REACHABILITY_WINDOW",
            &mut self.presenter.reachability_window,
        )?;

        // preferences
        if let Some(raw) = lookup("NETPANEL_PREFERENCES_FILE") {
            self.preferences.file = PathBuf::from(raw);
        }

        // logging
        set_bool(&lookup, "NETPANEL_LOG_ENABLED", &mut self.logging.enabled)?;
        if let Some(raw) = lookup("NETPANEL_LOG_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        set_u64(&lookup, "NETPANEL_LOG_MAX_SIZE_BYTES", &mut self.logging.max_size_bytes)?;

        // scale
        if let Some(raw) = lookup("NETPANEL_REFERENCE_CAPACITY") {
            self.scale.reference_capacity = Some(parse_u64("NETPANEL_REFERENCE_CAPACITY", &raw)?);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let windows = [
            ("presenter.latency_window", self.presenter.latency_window),
            ("presenter.chart_window", self.presenter.chart_window),
            (
                "presenter.reachability_window",
                self.presenter.reachability_window,
            ),
            (
                "presenter.reset_notice_capacity",
                self.presenter.reset_notice_capacity,
            ),
            (
                "presenter.source_request_capacity",
                self.presenter.source_request_capacity,
            ),
            ("logging.channel_capacity", self.logging.channel_capacity),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(NetpanelError::InvalidConfig {
                    details: format!("{name} must be > 0"),
                });
            }
        }

        if self.presenter.dashboard.trim().is_empty() {
            return Err(NetpanelError::InvalidConfig {
                details: "presenter.dashboard must not be empty".to_string(),
            });
        }

        if self.logging.max_size_bytes == 0 {
            return Err(NetpanelError::InvalidConfig {
                details: "logging.max_size_bytes must be > 0".to_string(),
            });
        }

        if self.scale.reference_capacity == Some(0) {
            return Err(NetpanelError::InvalidConfig {
                details: "scale.reference_capacity must be > 0 when set".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_usize(lookup: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut usize) -> Result<()> {
    if let Some(raw) = lookup(name) {
        *slot = raw
            .parse::<usize>()
            .map_err(|error| NetpanelError::ConfigParse {
                context: "env",
                details: format!("{name}={raw:?}: {error}"),
            })?;
    }
    Ok(())
}

fn set_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = lookup(name) {
        *slot = parse_u64(name, &raw)?;
    }
    Ok(())
}

fn set_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str, slot: &mut bool) -> Result<()> {
    if let Some(raw) = lookup(name) {
        *slot = raw.parse::<bool>().map_err(|error| NetpanelError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn parse_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| NetpanelError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, NetpanelError};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.presenter.latency_window, 90);
        assert_eq!(cfg.presenter.chart_window, 120);
    }

    #[test]
    fn zero_window_rejected() {
        let mut cfg = Config::default();
        cfg.presenter.latency_window = 0;
        let err = cfg.validate().expect_err("expected invalid window");
        match err {
            NetpanelError::InvalidConfig { details } => {
                assert!(details.contains("latency_window"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_reference_capacity_rejected() {
        let mut cfg = Config::default();
        cfg.scale.reference_capacity = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let cfg = Config::default();
        let before = cfg.stable_hash().expect("hash should compute");
        let mut modified = Config::default();
        modified.presenter.chart_window += 1;
        let after = modified.stable_hash().expect("hash should compute");
        assert_ne!(before, after);
        assert_eq!(before, Config::default().stable_hash().unwrap());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        let overrides = vars(&[
            ("NETPANEL_DASHBOARD", "en1"),
            ("NETPANEL_LATENCY_WINDOW", "30"),
            ("NETPANEL_LOG_ENABLED", "false"),
            ("NETPANEL_REFERENCE_CAPACITY", "125000000"),
            ("NETPANEL_PREFERENCES_FILE", "/tmp/np/prefs.json"),
        ]);
        cfg.apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect("env overrides should parse");
        assert_eq!(cfg.presenter.dashboard, "en1");
        assert_eq!(cfg.presenter.latency_window, 30);
        assert!(!cfg.logging.enabled);
        assert_eq!(cfg.scale.reference_capacity, Some(125_000_000));
        assert_eq!(cfg.preferences.file, PathBuf::from("/tmp/np/prefs.json"));
    }

    #[test]
    fn env_invalid_number_rejected() {
        let mut cfg = Config::default();
        let overrides = vars(&[("NETPANEL_CHART_WINDOW", "many")]);
        let err = cfg
            .apply_env_overrides_from(|name| overrides.get(name).cloned())
            .expect_err("invalid usize should fail");
        match err {
            NetpanelError::ConfigParse { context, details } => {
                assert_eq!(context, "env");
                assert!(details.contains("NETPANEL_CHART_WINDOW"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [presenter]
            latency_window = 45

            [scale]
            reference_capacity = 1000
            "#,
        )
        .expect("toml should parse");
        assert_eq!(cfg.presenter.latency_window, 45);
        assert_eq!(cfg.presenter.chart_window, 120);
        assert_eq!(cfg.scale.reference_capacity, Some(1000));
        assert!(cfg.logging.enabled);
    }

    #[test]
    fn missing_explicit_path_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/netpanel/config.toml")))
            .expect_err("missing explicit config should fail");
        assert_eq!(err.code(), "NP-1002");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[presenter]\ndashboard = \"en0\"\n").unwrap();
        let cfg = Config::load(Some(&path)).expect("config should load");
        // NETPANEL_DASHBOARD in the test environment would override this.
        if std::env::var_os("NETPANEL_DASHBOARD").is_none() {
            assert_eq!(cfg.presenter.dashboard, "en0");
        }
    }
}
