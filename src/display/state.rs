//! Published, display-ready views and the updates pushed to a render sink.

#![allow(missing_docs)]

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::display::field::Field;
use crate::display::scale::Ceiling;
use crate::display::units::{Context, Reading, UnitBase};
use crate::preferences::display::ColorChoice;

/// Interface link state derived from `UsageSample::link_up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Up,
    Down,
}

impl LinkState {
    #[must_use]
    pub const fn from_up(up: bool) -> Self {
        if up { Self::Up } else { Self::Down }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("Up"),
            Self::Down => f.write_str("Down"),
        }
    }
}

/// Radio details shown only for WiFi connections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiView {
    /// Network name, with the RSSI appended in parentheses when reported.
    pub ssid: Field<String>,
    pub standard: Field<String>,
    pub channel: Field<String>,
    /// Multi-line detail block (RSSI, noise, channel number/band/width, rate).
    pub details: Field<String>,
}

impl WifiView {
    #[must_use]
    pub fn not_applicable() -> Self {
        Self {
            ssid: Field::NotApplicable,
            standard: Field::NotApplicable,
            channel: Field::NotApplicable,
            details: Field::NotApplicable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageView {
    pub upload: Reading,
    pub download: Reading,
    pub upload_active: bool,
    pub download_active: bool,
    pub total_upload: Reading,
    pub total_download: Reading,
    pub last_reset: DateTime<Utc>,
    /// e.g. "Last reset 2 hours, 5 minutes ago".
    pub last_reset_label: String,
    /// `"{display_name} ({short_name})"`.
    pub interface: Field<String>,
    pub physical_address: Field<String>,
    pub wifi: WifiView,
    pub public_v4: Field<String>,
    pub public_v6: Field<String>,
    pub local_address: Field<String>,
    pub link: Field<LinkState>,
}

impl UsageView {
    /// Placeholder content shown before the first usage sample.
    #[must_use]
    pub fn placeholder(base: UnitBase, last_reset: DateTime<Utc>) -> Self {
        Self {
            upload: Reading::zero(Context::Rate, base),
            download: Reading::zero(Context::Rate, base),
            upload_active: false,
            download_active: false,
            total_upload: Reading::zero(Context::Total, UnitBase::Byte),
            total_download: Reading::zero(Context::Total, UnitBase::Byte),
            last_reset,
            last_reset_label: last_reset_label(last_reset, last_reset),
            interface: Field::Unknown,
            physical_address: Field::Unknown,
            wifi: WifiView::default(),
            public_v4: Field::Unknown,
            public_v6: Field::Unknown,
            local_address: Field::Unknown,
            link: Field::Unknown,
        }
    }
}

/// Internet reachability derived from the connectivity stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    #[default]
    Unknown,
    Up,
    Down,
}

impl Reachability {
    #[must_use]
    pub const fn from_probe(reachable: Option<bool>) -> Self {
        match reachable {
            None => Self::Unknown,
            Some(true) => Self::Up,
            Some(false) => Self::Down,
        }
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str(crate::display::field::UNKNOWN_TEXT),
            Self::Up => f.write_str("Up"),
            Self::Down => f.write_str("Down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityView {
    pub status: Reachability,
    /// Mean of the latency window, e.g. "12.34 ms".
    pub latency: String,
    pub latency_ms: f64,
    /// Oldest-first copy of the latency window.
    pub latency_history: Vec<f64>,
}

impl Default for ConnectivityView {
    fn default() -> Self {
        Self {
            status: Reachability::Unknown,
            latency: latency_label(0.0),
            latency_ms: 0.0,
            latency_history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRow {
    pub pid: u32,
    pub name: String,
    pub download: Reading,
    pub upload: Reading,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessView {
    pub rows: Vec<ProcessRow>,
}

/// Chart presentation settings the renderer needs alongside the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSettings {
    pub ceiling: Ceiling,
    pub reverse_order: bool,
    pub upload_color: ColorChoice,
    pub download_color: ColorChoice,
    pub unit_base: UnitBase,
}

/// Everything the presenter has published so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    pub usage: UsageView,
    pub connectivity: ConnectivityView,
    pub processes: ProcessView,
    pub chart: ChartSettings,
    pub public_ip_visible: bool,
    pub process_rows_visible: usize,
}

/// One throughput observation for the bandwidth chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub upload: f64,
    pub download: f64,
    pub ceiling: Ceiling,
}

/// Incremental update pushed to a render sink.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    Usage {
        view: Box<UsageView>,
        /// False when public and local addresses are unchanged.
        public_address_changed: bool,
    },
    /// Sent for every usage sample, visible or not.
    Throughput(ChartPoint),
    Connectivity(ConnectivityView),
    /// Sent for every probe that reported reachability, visible or not.
    Reachability(bool),
    Processes {
        /// Previous rows must be dropped before applying `rows`.
        cleared: bool,
        rows: Vec<ProcessRow>,
    },
    Chart(ChartSettings),
    PublicIpVisibility(bool),
    ProcessRowCount(usize),
}

/// Render a mean latency with two decimals and an `ms` suffix.
#[must_use]
pub fn latency_label(mean_ms: f64) -> String {
    format!("{mean_ms:.2} ms")
}

/// "Last reset N ago" with at most two non-zero units among days, hours, minutes.
#[must_use]
pub fn last_reset_label(last_reset: DateTime<Utc>, now: DateTime<Utc>) -> String {
    format!("Last reset {} ago", humanize(now - last_reset))
}

fn humanize(elapsed: TimeDelta) -> String {
    let total_minutes = elapsed.num_minutes().max(0);
    let parts = [
        (total_minutes / (24 * 60), "day"),
        ((total_minutes / 60) % 24, "hour"),
        (total_minutes % 60, "minute"),
    ];
    let rendered: Vec<String> = parts
        .iter()
        .filter(|(n, _)| *n > 0)
        .take(2)
        .map(|(n, unit)| {
            if *n == 1 {
                format!("1 {unit}")
            } else {
                format!("{n} {unit}s")
            }
        })
        .collect();
    if rendered.is_empty() {
        "0 minutes".to_string()
    } else {
        rendered.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minutes: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        (start, start + TimeDelta::minutes(minutes))
    }

    #[test]
    fn reset_label_zero_minutes() {
        let (a, b) = at(0);
        assert_eq!(last_reset_label(a, b), "Last reset 0 minutes ago");
    }

    #[test]
    fn reset_label_singular_and_plural() {
        let (a, b) = at(1);
        assert_eq!(last_reset_label(a, b), "Last reset 1 minute ago");
        let (a, b) = at(125);
        assert_eq!(last_reset_label(a, b), "Last reset 2 hours, 5 minutes ago");
    }

    #[test]
    fn reset_label_keeps_two_largest_nonzero_units() {
        let (a, b) = at(24 * 60 + 3 * 60 + 7);
        assert_eq!(last_reset_label(a, b), "Last reset 1 day, 3 hours ago");
        let (a, b) = at(2 * 24 * 60 + 9);
        assert_eq!(last_reset_label(a, b), "Last reset 2 days, 9 minutes ago");
    }

    #[test]
    fn reset_label_clock_skew_is_zero() {
        let (a, b) = at(-30);
        assert_eq!(last_reset_label(a, b), "Last reset 0 minutes ago");
    }

    #[test]
    fn latency_label_has_two_decimals() {
        assert_eq!(latency_label(0.0), "0.00 ms");
        assert_eq!(latency_label(12.345_6), "12.35 ms");
    }

    #[test]
    fn reachability_from_probe() {
        assert_eq!(Reachability::from_probe(None).to_string(), "Unknown");
        assert_eq!(Reachability::from_probe(Some(true)).to_string(), "Up");
        assert_eq!(Reachability::from_probe(Some(false)).to_string(), "Down");
    }

    #[test]
    fn placeholder_is_all_unknown() {
        let now = Utc::now();
        let view = UsageView::placeholder(UnitBase::Byte, now);
        assert_eq!(view.interface, Field::Unknown);
        assert_eq!(view.link, Field::Unknown);
        assert_eq!(view.wifi.ssid, Field::Unknown);
        assert_eq!(view.upload.to_string(), "0 B/s");
    }
}
