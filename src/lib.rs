#![forbid(unsafe_code)]

//! netpanel: live telemetry presentation engine for a network dashboard.
//!
//! Ingests bandwidth samples, connectivity probes and per-process usage from a
//! monitoring source and keeps display-ready state for one dashboard:
//! 1. **Visibility gate**: no recomputation while hidden, except the first
//!    sample of each stream
//! 2. **Bounded histories**: latency window and chart series as ring buffers
//! 3. **Namespaced preferences**: per-dashboard settings, written through on change
//!
//! # Library usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use netpanel::prelude::*;
//!
//! let bus = ResetBus::new();
//! let (presenter, _report) = Presenter::new(
//!     DashboardId::new("Network"),
//!     Arc::new(MemoryStore::new()),
//!     &bus,
//!     RecordingSink::new(),
//!     PresenterOptions::default(),
//! );
//! presenter.on_usage(&UsageSample::default());
//! println!("{}", presenter.display_state().usage.download);
//! ```

pub mod prelude;

pub mod core;
pub mod display;
pub mod logger;
pub mod preferences;
pub mod presenter;
pub mod telemetry;

#[cfg(test)]
mod test_properties;
