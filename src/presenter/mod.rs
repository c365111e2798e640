//! Visibility-gated presenter: ingests the three telemetry streams and keeps
//! the display-ready state for one dashboard.
//!
//! # Gate
//!
//! ```text
//! on sample:
//!     latency-like streams append to their history unconditionally
//!     if visible || !stream_initialized:
//!         recompute, publish, stream_initialized = true
//!     else:
//!         keep previously published values
//!     chart points are pushed either way
//! ```
//!
//! The first sample of each stream always gets through so the first paint
//! never shows placeholders for data that already arrived.
//!
//! # Locking
//!
//! All mutable state sits behind one `parking_lot::Mutex`. Every public call
//! takes it once, applies pending reset notices from the [`ResetBus`] and does
//! a bounded amount of work. Nothing inside blocks: logging, reset fan-out and
//! source requests all use `try_send`.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

pub mod reset;
pub mod sink;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::core::config::Config;
use crate::core::errors::{NetpanelError, Result};
use crate::display::field::{Field, UNKNOWN_TEXT, assign_if_changed};
use crate::display::scale::{Ceiling, ScaleMode, SizeUnit};
use crate::display::state::{
    ChartPoint, ChartSettings, ConnectivityView, DisplayState, DisplayUpdate, LinkState,
    ProcessRow, ProcessView, Reachability, UsageView, WifiView, last_reset_label, latency_label,
};
use crate::display::units::{Context, UnitBase, format};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::preferences::display::{
    ColorChoice, DisplayPreferenceStore, DisplayPreferences, PreferenceKey, ValidationReport,
};
use crate::preferences::store::{DashboardId, KeyValueStore};
use crate::telemetry::events::{SourceEvent, SourceRequest};
use crate::telemetry::ring::RingBuffer;
use crate::telemetry::samples::{
    ConnectionKind, ConnectivitySample, ProcessSample, UsageSample, WifiDetails,
};

use self::reset::{ResetBus, ResetSubscription};
use self::sink::RenderSink;

/// Whether any usage sample has been ingested yet. Never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    Live,
}

/// Per-stream publish/skip counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStats {
    pub usage_published: u64,
    pub usage_skipped: u64,
    pub connectivity_published: u64,
    pub connectivity_skipped: u64,
    pub processes_published: u64,
    pub processes_skipped: u64,
    pub resets_applied: u64,
    pub refresh_requests_dropped: u64,
}

/// Construction-time knobs.
#[derive(Debug, Clone)]
pub struct PresenterOptions {
    /// Latency samples averaged for the published latency.
    pub latency_window: usize,
    /// Link capacity in bytes/s for percentage scaling.
    pub reference_capacity: Option<u64>,
    pub logger: Option<ActivityLoggerHandle>,
    /// Where `request_public_ip_refresh` sends its request.
    pub source_requests: Option<Sender<SourceRequest>>,
}

impl Default for PresenterOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PresenterOptions {
    fn from(config: &Config) -> Self {
        Self {
            latency_window: config.presenter.latency_window,
            reference_capacity: config.scale.reference_capacity,
            logger: None,
            source_requests: None,
        }
    }
}

#[derive(Debug)]
struct PresenterState {
    last_upload_rate: i64,
    last_download_rate: i64,
    usage_initialized: bool,
    connectivity_initialized: bool,
    process_initialized: bool,
    last_reset: DateTime<Utc>,
    latency_history: RingBuffer<f64>,
}

struct Inner<S> {
    visible: bool,
    state: PresenterState,
    published: DisplayState,
    prefs: DisplayPreferenceStore,
    reference_capacity: Option<u64>,
    resets: ResetSubscription,
    sink: S,
    stats: GateStats,
}

/// Display-ready state for one dashboard, shared across ingestion threads.
pub struct Presenter<S: RenderSink> {
    dashboard: DashboardId,
    inner: Mutex<Inner<S>>,
    bus: Arc<ResetBus>,
    source_requests: Option<Sender<SourceRequest>>,
    logger: Option<ActivityLoggerHandle>,
}

impl<S: RenderSink> Presenter<S> {
    /// Load `dashboard`'s preferences from `store`, join `bus` and push the
    /// initial chart configuration to `sink`.
    pub fn new(
        dashboard: DashboardId,
        store: Arc<dyn KeyValueStore>,
        bus: &Arc<ResetBus>,
        sink: S,
        options: PresenterOptions,
    ) -> (Self, ValidationReport) {
        let (prefs, report) = DisplayPreferenceStore::open(store, dashboard.clone());
        let current = *prefs.current();
        let now = Utc::now();
        let chart = chart_settings(&current, options.reference_capacity);

        let mut inner = Inner {
            visible: false,
            state: PresenterState {
                last_upload_rate: 0,
                last_download_rate: 0,
                usage_initialized: false,
                connectivity_initialized: false,
                process_initialized: false,
                last_reset: now,
                latency_history: RingBuffer::new(options.latency_window),
            },
            published: DisplayState {
                usage: UsageView::placeholder(current.unit_base, now),
                connectivity: ConnectivityView::default(),
                processes: ProcessView::default(),
                chart,
                public_ip_visible: current.public_ip_visible,
                process_rows_visible: current.process_row_count,
            },
            prefs,
            reference_capacity: options.reference_capacity,
            resets: bus.subscribe(),
            sink,
            stats: GateStats::default(),
        };
        inner.sink.publish(DisplayUpdate::Chart(chart));
        inner
            .sink
            .publish(DisplayUpdate::PublicIpVisibility(current.public_ip_visible));
        inner
            .sink
            .publish(DisplayUpdate::ProcessRowCount(current.process_row_count));

        if let Some(logger) = &options.logger {
            logger.send(ActivityEvent::PreferencesLoaded {
                dashboard: dashboard.to_string(),
                warnings: report.warnings.clone(),
            });
        }

        let presenter = Self {
            dashboard,
            inner: Mutex::new(inner),
            bus: Arc::clone(bus),
            source_requests: options.source_requests,
            logger: options.logger,
        };
        (presenter, report)
    }

    #[must_use]
    pub const fn dashboard(&self) -> &DashboardId {
        &self.dashboard
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }

    /// Take the lock and fold in resets other presenters broadcast meanwhile.
    /// A notice older than the current reference is ignored.
    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        let mut inner = self.inner.lock();
        if let Some(at) = inner.resets.take_latest()
            && at > inner.state.last_reset
        {
            inner.apply_reset(at);
            inner.stats.resets_applied += 1;
            self.log(ActivityEvent::ResetApplied {
                dashboard: self.dashboard.to_string(),
                at: at.to_rfc3339(),
            });
        }
        inner
    }

    // ──────────────────── ingestion ────────────────────

    pub fn on_usage(&self, sample: &UsageSample) {
        let mut inner = self.lock();
        if inner.ingest_usage(sample, Utc::now()) {
            self.log_stream_initialized("usage");
        }
    }

    /// `None` is an absent probe result: latency counts as 0, status Unknown.
    pub fn on_connectivity(&self, sample: Option<&ConnectivitySample>) {
        let mut inner = self.lock();
        if inner.ingest_connectivity(sample) {
            self.log_stream_initialized("connectivity");
        }
    }

    pub fn on_process_list(&self, rows: &[ProcessSample]) {
        let mut inner = self.lock();
        if inner.ingest_processes(rows) {
            self.log_stream_initialized("processes");
        }
    }

    /// Dispatch one recorded or streamed [`SourceEvent`].
    pub fn apply_event(&self, event: &SourceEvent) {
        match event {
            SourceEvent::Usage(sample) => self.on_usage(sample),
            SourceEvent::Connectivity { sample } => self.on_connectivity(sample.as_ref()),
            SourceEvent::Processes { rows } => self.on_process_list(rows),
            SourceEvent::Visibility { visible } => self.set_visible(*visible),
            SourceEvent::Reset => {
                self.request_reset();
            }
        }
    }

    fn log_stream_initialized(&self, stream: &'static str) {
        self.log(ActivityEvent::StreamInitialized {
            dashboard: self.dashboard.to_string(),
            stream,
        });
    }

    // ──────────────────── control ────────────────────

    pub fn set_visible(&self, visible: bool) {
        let mut inner = self.lock();
        if inner.visible != visible {
            inner.visible = visible;
            self.log(ActivityEvent::VisibilityChanged {
                dashboard: self.dashboard.to_string(),
                visible,
            });
        }
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    /// Make now the "since last reset" reference and tell the other
    /// presenters on the bus. Returns the reset instant.
    pub fn request_reset(&self) -> DateTime<Utc> {
        let at = Utc::now();
        let mut inner = self.lock();
        inner.apply_reset(at);
        let notified = self.bus.broadcast(inner.resets.id(), at);
        self.log(ActivityEvent::ResetRequested {
            dashboard: self.dashboard.to_string(),
            at: at.to_rfc3339(),
            subscribers_notified: notified,
        });
        at
    }

    #[must_use]
    pub fn last_reset(&self) -> DateTime<Utc> {
        self.lock().state.last_reset
    }

    /// Ask the monitoring source to look up the public address again.
    ///
    /// Returns `Ok(false)` when no source channel is attached or the request
    /// was dropped because the channel is full.
    pub fn request_public_ip_refresh(&self) -> Result<bool> {
        let Some(tx) = &self.source_requests else {
            return Ok(false);
        };
        match tx.try_send(SourceRequest::RefreshPublicIp) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                self.lock().stats.refresh_requests_dropped += 1;
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(NetpanelError::ChannelClosed {
                component: "source requests",
            }),
        }
    }

    /// Force the connectivity status back to Unknown, e.g. while the source
    /// restarts its probe.
    pub fn reset_connectivity_view(&self) {
        let mut inner = self.lock();
        inner.published.connectivity.status = Reachability::Unknown;
        let view = inner.published.connectivity.clone();
        inner.sink.publish(DisplayUpdate::Connectivity(view));
    }

    /// Link capacity used by percentage scaling; `None` falls back to auto.
    pub fn set_reference_capacity(&self, capacity: Option<u64>) {
        let mut inner = self.lock();
        inner.reference_capacity = capacity;
        inner.republish_chart();
    }

    // ──────────────────── preferences ────────────────────

    pub fn set_upload_color(&self, color: ColorChoice) -> Result<()> {
        self.update_preference(PreferenceKey::UploadColor, |p| p.set_upload_color(color))
    }

    pub fn set_download_color(&self, color: ColorChoice) -> Result<()> {
        self.update_preference(PreferenceKey::DownloadColor, |p| {
            p.set_download_color(color)
        })
    }

    pub fn set_reverse_chart_order(&self, reverse: bool) -> Result<()> {
        self.update_preference(PreferenceKey::ReverseOrder, |p| {
            p.set_reverse_chart_order(reverse)
        })
    }

    pub fn set_chart_scale_mode(&self, mode: ScaleMode) -> Result<()> {
        self.update_preference(PreferenceKey::ChartScale, |p| p.set_chart_scale_mode(mode))
    }

    /// Refused outside `1..=1023`.
    pub fn set_fixed_scale_value(&self, value: i64) -> Result<()> {
        self.update_preference(PreferenceKey::ChartFixedScale, |p| {
            p.set_fixed_scale_value(value)
        })
    }

    pub fn set_fixed_scale_unit(&self, unit: SizeUnit) -> Result<()> {
        self.update_preference(PreferenceKey::ChartFixedScaleSize, |p| {
            p.set_fixed_scale_unit(unit)
        })
    }

    pub fn set_unit_base(&self, base: UnitBase) -> Result<()> {
        self.update_preference(PreferenceKey::Base, |p| p.set_unit_base(base))
    }

    /// Refused when negative. Clears the process table and lets the next
    /// process list through the gate.
    pub fn set_process_row_count(&self, count: i64) -> Result<()> {
        self.update_preference(PreferenceKey::Processes, |p| {
            p.set_process_row_count(count)
        })
    }

    pub fn set_public_ip_visible(&self, visible: bool) -> Result<()> {
        self.update_preference(PreferenceKey::PublicIp, |p| p.set_public_ip_visible(visible))
    }

    /// Parse and apply a preference given as text.
    pub fn set_preference(&self, key: PreferenceKey, raw: &str) -> Result<()> {
        self.update_preference(key, |p| p.set_from_str(key, raw))
    }

    #[must_use]
    pub fn preferences(&self) -> DisplayPreferences {
        *self.lock().prefs.current()
    }

    fn update_preference(
        &self,
        key: PreferenceKey,
        mutate: impl FnOnce(&mut DisplayPreferenceStore) -> Result<()>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let before = *inner.prefs.current();
        let result = mutate(&mut inner.prefs);
        let after = *inner.prefs.current();

        if before != after {
            inner.apply_preference_change(&before, &after);
            self.log(ActivityEvent::PreferenceChanged {
                dashboard: self.dashboard.to_string(),
                key: inner.prefs.keys().get(key).to_string(),
                value: inner.prefs.display_value(key),
            });
        }
        if let Err(err @ NetpanelError::PreferenceStore { .. }) = &result {
            self.log(ActivityEvent::PreferenceWriteFailed {
                dashboard: self.dashboard.to_string(),
                key: inner.prefs.keys().get(key).to_string(),
                error_code: err.code().to_string(),
                error_message: err.to_string(),
            });
        }
        result
    }

    // ──────────────────── queries ────────────────────

    #[must_use]
    pub fn display_state(&self) -> DisplayState {
        self.lock().published.clone()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.lock().state.usage_initialized {
            Phase::Live
        } else {
            Phase::Uninitialized
        }
    }

    #[must_use]
    pub fn gate_stats(&self) -> GateStats {
        self.lock().stats
    }

    /// Latest raw rates, tracked even while hidden.
    #[must_use]
    pub fn last_rates(&self) -> (i64, i64) {
        let inner = self.lock();
        (inner.state.last_upload_rate, inner.state.last_download_rate)
    }

    /// Oldest-first latency window.
    #[must_use]
    pub fn latency_history(&self) -> Vec<f64> {
        self.lock().state.latency_history.snapshot()
    }

    /// Run `f` against the sink under the presenter lock.
    pub fn with_sink<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock().sink)
    }
}

impl<S: RenderSink> Drop for Presenter<S> {
    fn drop(&mut self) {
        self.log(ActivityEvent::PresenterStopped {
            dashboard: self.dashboard.to_string(),
        });
    }
}

impl<S: RenderSink> Inner<S> {
    fn ceiling(&self) -> Ceiling {
        self.prefs
            .current()
            .scale_resolver(self.reference_capacity)
            .resolve()
    }

    /// Returns true when this sample initialized the stream.
    fn ingest_usage(&mut self, sample: &UsageSample, now: DateTime<Utc>) -> bool {
        self.state.last_upload_rate = sample.upload_bytes_per_sec;
        self.state.last_download_rate = sample.download_bytes_per_sec;

        let first = !self.state.usage_initialized;
        if self.visible || first {
            let base = self.prefs.current().unit_base;
            let view = &mut self.published.usage;
            view.upload = format(sample.upload_bytes_per_sec, Context::Rate, base);
            view.download = format(sample.download_bytes_per_sec, Context::Rate, base);
            view.upload_active = sample.upload_bytes_per_sec != 0;
            view.download_active = sample.download_bytes_per_sec != 0;
            view.total_upload = format(sample.total_upload_bytes, Context::Total, UnitBase::Byte);
            view.total_download =
                format(sample.total_download_bytes, Context::Total, UnitBase::Byte);
            view.last_reset = self.state.last_reset;
            view.last_reset_label = last_reset_label(self.state.last_reset, now);

            match &sample.interface {
                Some(iface) => {
                    view.interface =
                        Field::Known(format!("{} ({})", iface.display_name, iface.short_name));
                    view.physical_address = Field::Known(iface.physical_address.clone());
                }
                None => {
                    view.interface = Field::Unknown;
                    view.physical_address = Field::Unknown;
                }
            }

            view.wifi = match sample.connection_kind {
                ConnectionKind::Wifi => wifi_view(sample.wifi.as_ref()),
                ConnectionKind::Other => WifiView::not_applicable(),
            };

            let country = sample.wifi.as_ref().and_then(|w| w.country_code.as_deref());
            let v4 = Field::from(sample.public_address.v4.as_ref().map(|addr| match country {
                Some(cc) => format!("{addr} ({cc})"),
                None => addr.clone(),
            }));
            let v6 = Field::from(sample.public_address.v6.clone());
            let local = Field::from(sample.local_address.clone());
            let mut changed = assign_if_changed(&mut view.public_v4, v4);
            changed |= assign_if_changed(&mut view.public_v6, v6);
            changed |= assign_if_changed(&mut view.local_address, local);

            view.link = Field::Known(LinkState::from_up(sample.link_up));

            let update = DisplayUpdate::Usage {
                view: Box::new(view.clone()),
                public_address_changed: changed,
            };
            self.sink.publish(update);
            self.state.usage_initialized = true;
            self.stats.usage_published += 1;
        } else {
            self.stats.usage_skipped += 1;
        }

        let ceiling = self.ceiling();
        self.sink.publish(DisplayUpdate::Throughput(ChartPoint {
            upload: sample.upload_bytes_per_sec.max(0) as f64,
            download: sample.download_bytes_per_sec.max(0) as f64,
            ceiling,
        }));
        first
    }

    fn ingest_connectivity(&mut self, sample: Option<&ConnectivitySample>) -> bool {
        let latency = sample.and_then(|s| s.latency_ms).unwrap_or(0.0);
        self.state.latency_history.append(latency);

        let first = !self.state.connectivity_initialized;
        if self.visible || first {
            let mean = round2(self.state.latency_history.average());
            let view = ConnectivityView {
                status: Reachability::from_probe(sample.and_then(|s| s.reachable)),
                latency: latency_label(mean),
                latency_ms: mean,
                latency_history: self.state.latency_history.snapshot(),
            };
            self.published.connectivity = view.clone();
            self.sink.publish(DisplayUpdate::Connectivity(view));
            self.state.connectivity_initialized = true;
            self.stats.connectivity_published += 1;
        } else {
            self.stats.connectivity_skipped += 1;
        }

        if let Some(reachable) = sample.and_then(|s| s.reachable) {
            self.sink.publish(DisplayUpdate::Reachability(reachable));
        }
        first
    }

    fn ingest_processes(&mut self, samples: &[ProcessSample]) -> bool {
        let first = !self.state.process_initialized;
        if !self.visible && !first {
            self.stats.processes_skipped += 1;
            return false;
        }

        let base = self.prefs.current().unit_base;
        let limit = self.prefs.current().process_row_count;
        let rows: Vec<ProcessRow> = samples
            .iter()
            .take(limit)
            .map(|p| ProcessRow {
                pid: p.pid,
                name: p.name.clone(),
                download: format(p.download_bytes_per_sec, Context::Rate, base),
                upload: format(p.upload_bytes_per_sec, Context::Rate, base),
            })
            .collect();

        let cleared = rows.len() != self.published.processes.rows.len();
        self.published.processes.rows.clone_from(&rows);
        self.sink.publish(DisplayUpdate::Processes { cleared, rows });
        self.state.process_initialized = true;
        self.stats.processes_published += 1;
        first
    }

    fn apply_reset(&mut self, at: DateTime<Utc>) {
        self.state.last_reset = at;
        self.published.usage.last_reset = at;
        self.published.usage.last_reset_label = last_reset_label(at, Utc::now());
    }

    fn republish_chart(&mut self) {
        let chart = chart_settings(self.prefs.current(), self.reference_capacity);
        if assign_if_changed(&mut self.published.chart, chart) {
            self.sink.publish(DisplayUpdate::Chart(chart));
        }
    }

    fn apply_preference_change(&mut self, before: &DisplayPreferences, after: &DisplayPreferences) {
        self.republish_chart();

        if before.public_ip_visible != after.public_ip_visible {
            self.published.public_ip_visible = after.public_ip_visible;
            self.sink
                .publish(DisplayUpdate::PublicIpVisibility(after.public_ip_visible));
        }

        if before.process_row_count != after.process_row_count {
            self.published.process_rows_visible = after.process_row_count;
            self.published.processes.rows.clear();
            self.state.process_initialized = false;
            self.sink
                .publish(DisplayUpdate::ProcessRowCount(after.process_row_count));
        }
    }
}

fn chart_settings(prefs: &DisplayPreferences, reference_capacity: Option<u64>) -> ChartSettings {
    ChartSettings {
        ceiling: prefs.scale_resolver(reference_capacity).resolve(),
        reverse_order: prefs.reverse_chart_order,
        upload_color: prefs.upload_color,
        download_color: prefs.download_color,
        unit_base: prefs.unit_base,
    }
}

fn wifi_view(details: Option<&WifiDetails>) -> WifiView {
    let Some(d) = details else {
        return WifiView::default();
    };
    let ssid = match (&d.ssid, d.rssi) {
        (Some(name), Some(rssi)) => Field::Known(format!("{name} ({rssi})")),
        (Some(name), None) => Field::Known(name.clone()),
        (None, Some(rssi)) => Field::Known(format!("{UNKNOWN_TEXT} ({rssi})")),
        (None, None) => Field::Unknown,
    };
    let or_unknown = |v: Option<String>| v.unwrap_or_else(|| UNKNOWN_TEXT.to_string());
    let details = format!(
        "RSSI: {}\nNoise: {}\nChannel number: {}\nChannel band: {}\nChannel width: {}\nTransmit rate: {}",
        or_unknown(d.rssi.map(|v| format!("{v} dBm"))),
        or_unknown(d.noise.map(|v| format!("{v} dBm"))),
        or_unknown(d.channel_number.clone()),
        or_unknown(d.channel_band.clone()),
        or_unknown(d.channel_width.clone()),
        or_unknown(d.transmit_rate_mbps.map(|v| format!("{v} Mbps"))),
    );
    WifiView {
        ssid,
        standard: Field::from(d.standard.clone()),
        channel: Field::from(d.channel.clone()),
        details: Field::Known(details),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
