//! NP-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, NetpanelError>;

/// Top-level error type for netpanel.
#[derive(Debug, Error)]
pub enum NetpanelError {
    #[error("[NP-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[NP-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[NP-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[NP-1101] invalid preference {key}: {details}")]
    InvalidPreference { key: String, details: String },

    #[error("[NP-1102] preference store failure for {key}: {details}")]
    PreferenceStore { key: String, details: String },

    #[error("[NP-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[NP-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[NP-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[NP-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl NetpanelError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "NP-1001",
            Self::MissingConfig { .. } => "NP-1002",
            Self::ConfigParse { .. } => "NP-1003",
            Self::InvalidPreference { .. } => "NP-1101",
            Self::PreferenceStore { .. } => "NP-1102",
            Self::Serialization { .. } => "NP-2101",
            Self::Io { .. } => "NP-3002",
            Self::ChannelClosed { .. } => "NP-3003",
            Self::Runtime { .. } => "NP-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::PreferenceStore { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for a refused preference value.
    #[must_use]
    pub fn invalid_preference(key: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidPreference {
            key: key.into(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for NetpanelError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for NetpanelError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<NetpanelError> {
        vec![
            NetpanelError::InvalidConfig {
                details: String::new(),
            },
            NetpanelError::MissingConfig {
                path: PathBuf::new(),
            },
            NetpanelError::ConfigParse {
                context: "",
                details: String::new(),
            },
            NetpanelError::invalid_preference("", ""),
            NetpanelError::PreferenceStore {
                key: String::new(),
                details: String::new(),
            },
            NetpanelError::Serialization {
                context: "",
                details: String::new(),
            },
            NetpanelError::io("", std::io::Error::other("test")),
            NetpanelError::ChannelClosed { component: "" },
            NetpanelError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(NetpanelError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_np_prefix() {
        for err in &all_variants() {
            assert!(
                err.code().starts_with("NP-"),
                "code {} must start with NP-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = NetpanelError::invalid_preference("Network_chartFixedScale", "0 is below 1");
        let msg = err.to_string();
        assert!(msg.contains("NP-1101"), "display should contain code: {msg}");
        assert!(msg.contains("Network_chartFixedScale"), "display: {msg}");
        assert!(msg.contains("0 is below 1"), "display: {msg}");
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(NetpanelError::io("/tmp/x", std::io::Error::other("test")).is_retryable());
        assert!(NetpanelError::ChannelClosed { component: "bus" }.is_retryable());
        assert!(!NetpanelError::invalid_preference("k", "v").is_retryable());
        assert!(
            !NetpanelError::MissingConfig {
                path: PathBuf::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: NetpanelError = json_err.into();
        assert_eq!(err.code(), "NP-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: NetpanelError = toml_err.into();
        assert_eq!(err.code(), "NP-1003");
    }
}
