//! Activity logging handle: presenters send events over a bounded crossbeam
//! channel to a dedicated logger thread that owns the [`JsonlWriter`].
//!
//! `send()` uses `try_send()` so an ingestion call holding the presenter lock
//! is never blocked by logging back-pressure.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{NetpanelError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Events presenters and the CLI report.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    PresenterStarted {
        dashboard: String,
        config_hash: String,
    },
    PresenterStopped {
        dashboard: String,
    },
    StreamInitialized {
        dashboard: String,
        stream: &'static str,
    },
    VisibilityChanged {
        dashboard: String,
        visible: bool,
    },
    ResetRequested {
        dashboard: String,
        at: String,
        subscribers_notified: usize,
    },
    ResetApplied {
        dashboard: String,
        at: String,
    },
    PreferencesLoaded {
        dashboard: String,
        warnings: Vec<String>,
    },
    PreferenceChanged {
        dashboard: String,
        key: String,
        value: String,
    },
    PreferenceWriteFailed {
        dashboard: String,
        key: String,
        error_code: String,
        error_message: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

/// Thread-safe, cheaply-cloneable handle for sending log events.
#[derive(Debug, Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Non-blocking. A full channel drops the event and bumps the counter.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// Handle whose events go nowhere; for embedders that do not want a log.
    #[must_use]
    pub fn disconnected() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Spawn the logger thread. It runs until `shutdown()` or until every handle
/// is dropped.
pub fn spawn_logger(
    config: JsonlConfig,
    channel_capacity: usize,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("netpanel-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped_clone))
        .map_err(|e| NetpanelError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
}

#[must_use]
pub fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::PresenterStarted {
            dashboard,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::PresenterStart, Severity::Info);
            e.dashboard = Some(dashboard.clone());
            e.details = Some(format!("config_hash={config_hash}"));
            e
        }
        ActivityEvent::PresenterStopped { dashboard } => {
            let mut e = LogEntry::new(EventType::PresenterStop, Severity::Info);
            e.dashboard = Some(dashboard.clone());
            e
        }
        ActivityEvent::StreamInitialized { dashboard, stream } => {
            let mut e = LogEntry::new(EventType::StreamInitialized, Severity::Info);
            e.dashboard = Some(dashboard.clone());
            e.stream = Some((*stream).to_string());
            e
        }
        ActivityEvent::VisibilityChanged { dashboard, visible } => {
            let mut e = LogEntry::new(EventType::VisibilityChanged, Severity::Info);
            e.dashboard = Some(dashboard.clone());
            e.value = Some(visible.to_string());
            e
        }
        ActivityEvent::ResetRequested {
            dashboard,
            at,
            subscribers_notified,
        } => {
            let mut e = LogEntry::new(EventType::ResetRequested, Severity::Info);
            e.dashboard = Some(dashboard.clone());
            e.value = Some(at.clone());
            e.details = Some(format!("subscribers_notified={subscribers_notified}"));
            e
        }
        ActivityEvent::ResetApplied { dashboard, at } => {
            let mut e = LogEntry::new(EventType::ResetApplied, Severity::Info);
            e.dashboard = Some(dashboard.clone());
            e.value = Some(at.clone());
            e
        }
        ActivityEvent::PreferencesLoaded {
            dashboard,
            warnings,
        } => {
            let severity = if warnings.is_empty() {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut e = LogEntry::new(EventType::PreferencesLoaded, severity);
            e.dashboard = Some(dashboard.clone());
            if !warnings.is_empty() {
                e.details = Some(warnings.join("; "));
            }
            e
        }
        ActivityEvent::PreferenceChanged {
            dashboard,
            key,
            value,
        } => {
            let mut e = LogEntry::new(EventType::PreferenceChanged, Severity::Info);
            e.dashboard = Some(dashboard.clone());
            e.key = Some(key.clone());
            e.value = Some(value.clone());
            e
        }
        ActivityEvent::PreferenceWriteFailed {
            dashboard,
            key,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::PreferenceWriteFailed, Severity::Warning);
            e.dashboard = Some(dashboard.clone());
            e.key = Some(key.clone());
            e.error_code = Some(error_code.clone());
            e.details = Some(error_message.clone());
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Error);
            e.error_code = Some(code.clone());
            e.details = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::PresenterStop, Severity::Info),
    }
}
