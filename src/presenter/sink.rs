//! Render sinks: the consumers of [`DisplayUpdate`]s.
//!
//! The presenter only ever pushes; it never queries a sink. Pixel rendering
//! lives behind this trait.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Sender, TrySendError};

use crate::display::scale::Ceiling;
use crate::display::state::{
    ChartSettings, ConnectivityView, DisplayUpdate, ProcessRow, UsageView,
};
use crate::telemetry::ring::RingBuffer;

/// Samples kept per chart series.
pub const CHART_CAPACITY: usize = 120;
/// Cells in the reachability grid.
pub const REACHABILITY_CAPACITY: usize = 90;

/// Consumer of presenter output. Called with the presenter lock held, so
/// implementations must not block.
pub trait RenderSink: Send {
    fn publish(&mut self, update: DisplayUpdate);
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn publish(&mut self, update: DisplayUpdate) {
        (**self).publish(update);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn publish(&mut self, _update: DisplayUpdate) {}
}

/// Forwards updates to a render thread over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<DisplayUpdate>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: Sender<DisplayUpdate>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Updates lost to a full or closed channel.
    #[must_use]
    pub fn dropped_updates(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl RenderSink for ChannelSink {
    fn publish(&mut self, update: DisplayUpdate) {
        if let Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) = self.tx.try_send(update)
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Keeps the chart histories and the latest state of every view, the way a
/// widget tree would.
#[derive(Debug)]
pub struct RecordingSink {
    upload: RingBuffer<f64>,
    download: RingBuffer<f64>,
    reachability: RingBuffer<bool>,
    ceiling: Ceiling,
    usage: Option<UsageView>,
    connectivity: Option<ConnectivityView>,
    rows: Vec<ProcessRow>,
    row_slots: Option<usize>,
    chart: Option<ChartSettings>,
    public_ip_visible: Option<bool>,
    published: u64,
    log: Option<Vec<DisplayUpdate>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::with_capacities(CHART_CAPACITY, REACHABILITY_CAPACITY)
    }
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacities(chart: usize, reachability: usize) -> Self {
        Self {
            upload: RingBuffer::new(chart),
            download: RingBuffer::new(chart),
            reachability: RingBuffer::new(reachability),
            ceiling: Ceiling::Auto,
            usage: None,
            connectivity: None,
            rows: Vec::new(),
            row_slots: None,
            chart: None,
            public_ip_visible: None,
            published: 0,
            log: None,
        }
    }

    /// Also keep every update in arrival order.
    #[must_use]
    pub fn logging(mut self) -> Self {
        self.log = Some(Vec::new());
        self
    }

    #[must_use]
    pub fn upload_series(&self) -> Vec<f64> {
        self.upload.snapshot()
    }

    #[must_use]
    pub fn download_series(&self) -> Vec<f64> {
        self.download.snapshot()
    }

    #[must_use]
    pub fn reachability(&self) -> Vec<bool> {
        self.reachability.snapshot()
    }

    /// Ceiling attached to the most recent throughput point.
    #[must_use]
    pub const fn ceiling(&self) -> Ceiling {
        self.ceiling
    }

    /// Axis top for the current frame, over both series.
    #[must_use]
    pub fn chart_peak(&self) -> f64 {
        let observed: Vec<f64> = self.upload.iter().chain(self.download.iter()).copied().collect();
        self.ceiling.effective_peak(&observed)
    }

    #[must_use]
    pub const fn usage(&self) -> Option<&UsageView> {
        self.usage.as_ref()
    }

    #[must_use]
    pub const fn connectivity(&self) -> Option<&ConnectivityView> {
        self.connectivity.as_ref()
    }

    #[must_use]
    pub fn rows(&self) -> &[ProcessRow] {
        &self.rows
    }

    /// Row count the process table was last sized to.
    #[must_use]
    pub const fn row_slots(&self) -> Option<usize> {
        self.row_slots
    }

    #[must_use]
    pub const fn chart(&self) -> Option<&ChartSettings> {
        self.chart.as_ref()
    }

    #[must_use]
    pub const fn public_ip_visible(&self) -> Option<bool> {
        self.public_ip_visible
    }

    /// Number of updates received.
    #[must_use]
    pub const fn published(&self) -> u64 {
        self.published
    }

    /// Every update so far; empty unless built with [`Self::logging`].
    #[must_use]
    pub fn log(&self) -> &[DisplayUpdate] {
        self.log.as_deref().unwrap_or(&[])
    }
}

impl RenderSink for RecordingSink {
    fn publish(&mut self, update: DisplayUpdate) {
        self.published += 1;
        if let Some(log) = self.log.as_mut() {
            log.push(update.clone());
        }
        match update {
            DisplayUpdate::Usage { view, .. } => self.usage = Some(*view),
            DisplayUpdate::Throughput(point) => {
                self.upload.append(point.upload);
                self.download.append(point.download);
                self.ceiling = point.ceiling;
            }
            DisplayUpdate::Connectivity(view) => self.connectivity = Some(view),
            DisplayUpdate::Reachability(up) => self.reachability.append(up),
            DisplayUpdate::Processes { cleared, rows } => {
                if cleared {
                    self.rows.clear();
                }
                for (i, row) in rows.into_iter().enumerate() {
                    if i < self.rows.len() {
                        self.rows[i] = row;
                    } else {
                        self.rows.push(row);
                    }
                }
            }
            DisplayUpdate::Chart(settings) => self.chart = Some(settings),
            DisplayUpdate::PublicIpVisibility(visible) => self.public_ip_visible = Some(visible),
            DisplayUpdate::ProcessRowCount(count) => {
                self.row_slots = Some(count);
                self.rows.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::state::ChartPoint;
    use crate::display::units::{Context, UnitBase, format};
    use crossbeam_channel::bounded;

    fn row(pid: u32) -> ProcessRow {
        ProcessRow {
            pid,
            name: format!("proc-{pid}"),
            download: format(0, Context::Rate, UnitBase::Byte),
            upload: format(0, Context::Rate, UnitBase::Byte),
        }
    }

    #[test]
    fn cleared_update_drops_stale_rows() {
        let mut sink = RecordingSink::new();
        sink.publish(DisplayUpdate::Processes {
            cleared: false,
            rows: (1..=5).map(row).collect(),
        });
        sink.publish(DisplayUpdate::Processes {
            cleared: true,
            rows: vec![row(7), row(8)],
        });
        let pids: Vec<u32> = sink.rows().iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![7, 8]);
    }

    #[test]
    fn uncleared_update_overwrites_in_place() {
        let mut sink = RecordingSink::new();
        sink.publish(DisplayUpdate::Processes {
            cleared: false,
            rows: vec![row(1), row(2)],
        });
        sink.publish(DisplayUpdate::Processes {
            cleared: false,
            rows: vec![row(3), row(4)],
        });
        assert_eq!(sink.rows().len(), 2);
        assert_eq!(sink.rows()[0].pid, 3);
    }

    #[test]
    fn chart_series_are_bounded() {
        let mut sink = RecordingSink::with_capacities(3, 2);
        for i in 0..5 {
            sink.publish(DisplayUpdate::Throughput(ChartPoint {
                upload: f64::from(i),
                download: f64::from(i * 10),
                ceiling: Ceiling::Auto,
            }));
            sink.publish(DisplayUpdate::Reachability(i % 2 == 0));
        }
        assert_eq!(sink.upload_series(), vec![2.0, 3.0, 4.0]);
        assert_eq!(sink.reachability(), vec![false, true]);
        assert!((sink.chart_peak() - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fixed_ceiling_ignores_series_peak() {
        let mut sink = RecordingSink::new();
        sink.publish(DisplayUpdate::Throughput(ChartPoint {
            upload: 5.0e9,
            download: 1.0,
            ceiling: Ceiling::Fixed { bytes: 1024 },
        }));
        assert!((sink.chart_peak() - 1024.0).abs() < f64::EPSILON);
    }

    #[test]
    fn logging_sink_keeps_order() {
        let mut sink = RecordingSink::new().logging();
        sink.publish(DisplayUpdate::PublicIpVisibility(false));
        sink.publish(DisplayUpdate::ProcessRowCount(3));
        assert_eq!(sink.published(), 2);
        assert_eq!(sink.log()[1], DisplayUpdate::ProcessRowCount(3));
        assert_eq!(sink.row_slots(), Some(3));
    }

    #[test]
    fn channel_sink_counts_drops() {
        let (tx, rx) = bounded(1);
        let mut sink = ChannelSink::new(tx);
        sink.publish(DisplayUpdate::Reachability(true));
        sink.publish(DisplayUpdate::Reachability(false));
        assert_eq!(sink.dropped_updates(), 1);
        assert_eq!(rx.try_recv().unwrap(), DisplayUpdate::Reachability(true));
    }
}
