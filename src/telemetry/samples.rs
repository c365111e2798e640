//! Measurement samples produced by the monitoring source.
//!
//! Samples are immutable snapshots. The presenter consumes them by reference
//! and never retains them; every optional sub-field maps to an explicit
//! `Unknown` sentinel downstream rather than an empty string.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

/// Physical link category reported alongside a usage sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Wifi,
    #[default]
    Other,
}

/// Active network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Human-facing name, e.g. "Wi-Fi".
    pub display_name: String,
    /// Kernel/BSD name, e.g. "en0".
    pub short_name: String,
    /// Hardware (MAC) address.
    pub physical_address: String,
}

/// Radio details for a WiFi connection. Each field may be unreported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiDetails {
    pub ssid: Option<String>,
    pub rssi: Option<i32>,
    pub noise: Option<i32>,
    pub standard: Option<String>,
    pub channel: Option<String>,
    pub channel_number: Option<String>,
    pub channel_band: Option<String>,
    pub channel_width: Option<String>,
    pub transmit_rate_mbps: Option<f64>,
    pub country_code: Option<String>,
}

/// Public (remote-facing) addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicAddress {
    pub v4: Option<String>,
    pub v6: Option<String>,
}

/// One bandwidth poll of the active interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSample {
    pub upload_bytes_per_sec: i64,
    pub download_bytes_per_sec: i64,
    pub total_upload_bytes: i64,
    pub total_download_bytes: i64,
    pub interface: Option<InterfaceInfo>,
    pub connection_kind: ConnectionKind,
    pub wifi: Option<WifiDetails>,
    pub public_address: PublicAddress,
    pub local_address: Option<String>,
    pub link_up: bool,
}

/// One internet reachability probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivitySample {
    /// `None` when the probe could not determine reachability.
    pub reachable: Option<bool>,
    pub latency_ms: Option<f64>,
}

/// Bandwidth attributed to a single process, as ranked by the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub upload_bytes_per_sec: i64,
    pub download_bytes_per_sec: i64,
}
