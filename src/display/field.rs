//! Tri-state display values.
//!
//! `Unknown` means the source applies but did not report a value (e.g. a WiFi
//! link without an RSSI). `NotApplicable` means the value does not exist for
//! this connection kind (e.g. SSID on ethernet). The two render differently.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Text shown for [`Field::Unknown`].
pub const UNKNOWN_TEXT: &str = "Unknown";
/// Text shown for [`Field::NotApplicable`].
pub const UNAVAILABLE_TEXT: &str = "Unavailable";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Field<T> {
    Known(T),
    Unknown,
    NotApplicable,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<T> Field<T> {
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    #[must_use]
    pub const fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown | Self::NotApplicable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Self::Known(v) => Field::Known(f(v)),
            Self::Unknown => Field::Unknown,
            Self::NotApplicable => Field::NotApplicable,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => v.fmt(f),
            Self::Unknown => f.write_str(UNKNOWN_TEXT),
            Self::NotApplicable => f.write_str(UNAVAILABLE_TEXT),
        }
    }
}

/// Overwrite `slot` only when the value differs. Returns whether it changed.
pub fn assign_if_changed<T: PartialEq>(slot: &mut T, next: T) -> bool {
    if *slot == next {
        return false;
    }
    *slot = next;
    true
}
