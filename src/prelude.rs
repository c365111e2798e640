//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use netpanel::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{NetpanelError, Result};

// Telemetry
pub use crate::telemetry::events::{SourceEvent, SourceRequest, read_events};
pub use crate::telemetry::ring::RingBuffer;
pub use crate::telemetry::samples::{
    ConnectionKind, ConnectivitySample, ProcessSample, UsageSample,
};

// Display
pub use crate::display::field::Field;
pub use crate::display::scale::{Ceiling, ScaleMode, ScaleResolver, SizeUnit};
pub use crate::display::state::{DisplayState, DisplayUpdate};
pub use crate::display::units::{Context, Reading, UnitBase};

// Preferences
pub use crate::preferences::display::{ColorChoice, DisplayPreferences, PreferenceKey};
pub use crate::preferences::store::{DashboardId, JsonFileStore, KeyValueStore, MemoryStore};

// Presenter
pub use crate::presenter::reset::ResetBus;
pub use crate::presenter::sink::{ChannelSink, NullSink, RecordingSink, RenderSink};
pub use crate::presenter::{Phase, Presenter, PresenterOptions};

// Logger
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
