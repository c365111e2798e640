//! Typed display preferences for one dashboard, backed by a [`KeyValueStore`].
//!
//! # Merge Order
//!
//! ```text
//! compiled defaults → persisted values (validated, clamped)
//! ```
//!
//! Store keys are resolved once into [`PreferenceKeys`] when the adapter is
//! built. Each setter updates the in-memory copy and then writes through; a
//! failed write is returned to the caller but the new value stays in effect.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{NetpanelError, Result};
use crate::display::scale::{
    FIXED_SCALE_MAX, FIXED_SCALE_MIN, FixedScaleValue, ScaleMode, ScaleResolver, SizeUnit,
};
use crate::display::units::UnitBase;
use crate::preferences::store::{DashboardId, KeyValueStore};

// ──────────────────── colors ────────────────────

/// Palette entry chosen for a chart series. Only the stable key is modelled;
/// the concrete RGB values belong to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorChoice {
    SystemAccent,
    Monochrome,
    Red,
    SecondRed,
    Green,
    SecondGreen,
    Blue,
    SecondBlue,
    Yellow,
    SecondYellow,
    Orange,
    SecondOrange,
    Purple,
    SecondPurple,
    Brown,
    SecondBrown,
    Gray,
    SecondGray,
}

impl ColorChoice {
    pub const ALL: [Self; 18] = [
        Self::SystemAccent,
        Self::Monochrome,
        Self::Red,
        Self::SecondRed,
        Self::Green,
        Self::SecondGreen,
        Self::Blue,
        Self::SecondBlue,
        Self::Yellow,
        Self::SecondYellow,
        Self::Orange,
        Self::SecondOrange,
        Self::Purple,
        Self::SecondPurple,
        Self::Brown,
        Self::SecondBrown,
        Self::Gray,
        Self::SecondGray,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::SystemAccent => "systemAccent",
            Self::Monochrome => "monochrome",
            Self::Red => "red",
            Self::SecondRed => "secondRed",
            Self::Green => "green",
            Self::SecondGreen => "secondGreen",
            Self::Blue => "blue",
            Self::SecondBlue => "secondBlue",
            Self::Yellow => "yellow",
            Self::SecondYellow => "secondYellow",
            Self::Orange => "orange",
            Self::SecondOrange => "secondOrange",
            Self::Purple => "purple",
            Self::SecondPurple => "secondPurple",
            Self::Brown => "brown",
            Self::SecondBrown => "secondBrown",
            Self::Gray => "gray",
            Self::SecondGray => "secondGray",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl fmt::Display for ColorChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ──────────────────── preferences ────────────────────

/// Default number of per-process rows.
pub const DEFAULT_PROCESS_ROWS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayPreferences {
    pub upload_color: ColorChoice,
    pub download_color: ColorChoice,
    pub reverse_chart_order: bool,
    pub chart_scale_mode: ScaleMode,
    pub fixed_scale_value: FixedScaleValue,
    pub fixed_scale_unit: SizeUnit,
    pub unit_base: UnitBase,
    pub process_row_count: usize,
    pub public_ip_visible: bool,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            upload_color: ColorChoice::SecondRed,
            download_color: ColorChoice::SecondBlue,
            reverse_chart_order: false,
            chart_scale_mode: ScaleMode::None,
            fixed_scale_value: FixedScaleValue::DEFAULT,
            fixed_scale_unit: SizeUnit::MB,
            unit_base: UnitBase::Byte,
            process_row_count: DEFAULT_PROCESS_ROWS,
            public_ip_visible: true,
        }
    }
}

impl DisplayPreferences {
    /// Scale resolver inputs for these preferences.
    #[must_use]
    pub fn scale_resolver(&self, reference_capacity: Option<u64>) -> ScaleResolver {
        ScaleResolver {
            mode: self.chart_scale_mode,
            fixed_value: self.fixed_scale_value,
            fixed_unit: self.fixed_scale_unit,
            reference_capacity,
        }
    }
}

// ──────────────────── keys ────────────────────

/// One persisted preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    UploadColor,
    DownloadColor,
    ReverseOrder,
    ChartScale,
    ChartFixedScale,
    ChartFixedScaleSize,
    Base,
    Processes,
    PublicIp,
}

impl PreferenceKey {
    pub const ALL: [Self; 9] = [
        Self::UploadColor,
        Self::DownloadColor,
        Self::ReverseOrder,
        Self::ChartScale,
        Self::ChartFixedScale,
        Self::ChartFixedScaleSize,
        Self::Base,
        Self::Processes,
        Self::PublicIp,
    ];

    /// Unscoped key suffix.
    #[must_use]
    pub const fn leaf(self) -> &'static str {
        match self {
            Self::UploadColor => "uploadColor",
            Self::DownloadColor => "downloadColor",
            Self::ReverseOrder => "reverseOrder",
            Self::ChartScale => "chartScale",
            Self::ChartFixedScale => "chartFixedScale",
            Self::ChartFixedScaleSize => "chartFixedScaleSize",
            Self::Base => "base",
            Self::Processes => "processes",
            Self::PublicIp => "publicIP",
        }
    }

    #[must_use]
    pub fn from_leaf(leaf: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.leaf() == leaf)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PreferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.leaf())
    }
}

/// Fully scoped store keys for one dashboard, resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceKeys {
    dashboard: DashboardId,
    scoped: [String; 9],
}

impl PreferenceKeys {
    #[must_use]
    pub fn new(dashboard: DashboardId) -> Self {
        let scoped = PreferenceKey::ALL.map(|k| dashboard.scoped(k.leaf()));
        Self { dashboard, scoped }
    }

    #[must_use]
    pub fn dashboard(&self) -> &DashboardId {
        &self.dashboard
    }

    #[must_use]
    pub fn get(&self, key: PreferenceKey) -> &str {
        &self.scoped[key.index()]
    }
}

// ──────────────────── validation ────────────────────

/// Issues found while loading persisted preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

fn read_keyed<T>(
    store: &dyn KeyValueStore,
    keys: &PreferenceKeys,
    key: PreferenceKey,
    parse: impl Fn(&str) -> Option<T>,
    default: T,
    report: &mut ValidationReport,
) -> T {
    match store.read(keys.get(key)) {
        None => default,
        Some(Value::String(raw)) => parse(&raw).unwrap_or_else(|| {
            report
                .warnings
                .push(format!("{}={raw:?} is not recognized; using default", keys.get(key)));
            default
        }),
        Some(other) => {
            report
                .warnings
                .push(format!("{}={other} is not a string; using default", keys.get(key)));
            default
        }
    }
}

fn read_bool(
    store: &dyn KeyValueStore,
    keys: &PreferenceKeys,
    key: PreferenceKey,
    default: bool,
    report: &mut ValidationReport,
) -> bool {
    match store.read(keys.get(key)) {
        None => default,
        Some(Value::Bool(v)) => v,
        Some(other) => {
            report
                .warnings
                .push(format!("{}={other} is not a boolean; using default", keys.get(key)));
            default
        }
    }
}

fn read_int(
    store: &dyn KeyValueStore,
    keys: &PreferenceKeys,
    key: PreferenceKey,
    report: &mut ValidationReport,
) -> Option<i64> {
    match store.read(keys.get(key)) {
        None => None,
        Some(Value::Number(n)) if n.as_i64().is_some() => n.as_i64(),
        Some(other) => {
            report
                .warnings
                .push(format!("{}={other} is not an integer; using default", keys.get(key)));
            None
        }
    }
}

/// Load and validate preferences. Out-of-range values are clamped and reported.
#[must_use]
pub fn load(store: &dyn KeyValueStore, keys: &PreferenceKeys) -> (DisplayPreferences, ValidationReport) {
    let defaults = DisplayPreferences::default();
    let mut report = ValidationReport::default();

    let upload_color = read_keyed(
        store,
        keys,
        PreferenceKey::UploadColor,
        ColorChoice::from_key,
        defaults.upload_color,
        &mut report,
    );
    let download_color = read_keyed(
        store,
        keys,
        PreferenceKey::DownloadColor,
        ColorChoice::from_key,
        defaults.download_color,
        &mut report,
    );
    let chart_scale_mode = read_keyed(
        store,
        keys,
        PreferenceKey::ChartScale,
        ScaleMode::from_key,
        defaults.chart_scale_mode,
        &mut report,
    );
    let fixed_scale_unit = read_keyed(
        store,
        keys,
        PreferenceKey::ChartFixedScaleSize,
        SizeUnit::from_key,
        defaults.fixed_scale_unit,
        &mut report,
    );
    let unit_base = read_keyed(
        store,
        keys,
        PreferenceKey::Base,
        UnitBase::from_key,
        defaults.unit_base,
        &mut report,
    );
    let reverse_chart_order = read_bool(
        store,
        keys,
        PreferenceKey::ReverseOrder,
        defaults.reverse_chart_order,
        &mut report,
    );
    let public_ip_visible = read_bool(
        store,
        keys,
        PreferenceKey::PublicIp,
        defaults.public_ip_visible,
        &mut report,
    );

    let fixed_scale_value = match read_int(store, keys, PreferenceKey::ChartFixedScale, &mut report) {
        None => defaults.fixed_scale_value,
        Some(raw) => FixedScaleValue::new(raw).unwrap_or_else(|| {
            let clamped = FixedScaleValue::clamped(raw);
            report.warnings.push(format!(
                "{}={raw} outside {FIXED_SCALE_MIN}..={FIXED_SCALE_MAX}; clamped to {clamped}",
                keys.get(PreferenceKey::ChartFixedScale),
            ));
            clamped
        }),
    };

    let process_row_count = match read_int(store, keys, PreferenceKey::Processes, &mut report) {
        None => defaults.process_row_count,
        Some(raw) => usize::try_from(raw).unwrap_or_else(|_| {
            report.warnings.push(format!(
                "{}={raw} is negative; clamped to 0",
                keys.get(PreferenceKey::Processes),
            ));
            0
        }),
    };

    let prefs = DisplayPreferences {
        upload_color,
        download_color,
        reverse_chart_order,
        chart_scale_mode,
        fixed_scale_value,
        fixed_scale_unit,
        unit_base,
        process_row_count,
        public_ip_visible,
    };
    (prefs, report)
}

// ──────────────────── adapter ────────────────────

/// Typed, write-through view of one dashboard's preferences.
pub struct DisplayPreferenceStore {
    store: Arc<dyn KeyValueStore>,
    keys: PreferenceKeys,
    current: DisplayPreferences,
}

impl fmt::Debug for DisplayPreferenceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayPreferenceStore")
            .field("dashboard", self.keys.dashboard())
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl DisplayPreferenceStore {
    /// Resolve keys for `dashboard` and load its preferences once.
    #[must_use]
    pub fn open(store: Arc<dyn KeyValueStore>, dashboard: DashboardId) -> (Self, ValidationReport) {
        let keys = PreferenceKeys::new(dashboard);
        let (current, report) = load(store.as_ref(), &keys);
        (
            Self {
                store,
                keys,
                current,
            },
            report,
        )
    }

    #[must_use]
    pub const fn current(&self) -> &DisplayPreferences {
        &self.current
    }

    #[must_use]
    pub fn keys(&self) -> &PreferenceKeys {
        &self.keys
    }

    fn persist(&self, key: PreferenceKey, value: Value) -> Result<()> {
        self.store.write(self.keys.get(key), value)
    }

    pub fn set_upload_color(&mut self, color: ColorChoice) -> Result<()> {
        self.current.upload_color = color;
        self.persist(PreferenceKey::UploadColor, Value::from(color.key()))
    }

    pub fn set_download_color(&mut self, color: ColorChoice) -> Result<()> {
        self.current.download_color = color;
        self.persist(PreferenceKey::DownloadColor, Value::from(color.key()))
    }

    pub fn set_reverse_chart_order(&mut self, reverse: bool) -> Result<()> {
        self.current.reverse_chart_order = reverse;
        self.persist(PreferenceKey::ReverseOrder, Value::from(reverse))
    }

    pub fn set_chart_scale_mode(&mut self, mode: ScaleMode) -> Result<()> {
        self.current.chart_scale_mode = mode;
        self.persist(PreferenceKey::ChartScale, Value::from(mode.key()))
    }

    /// Refuses values outside `1..=1023` without touching the current value.
    pub fn set_fixed_scale_value(&mut self, value: i64) -> Result<()> {
        let Some(valid) = FixedScaleValue::new(value) else {
            return Err(NetpanelError::invalid_preference(
                self.keys.get(PreferenceKey::ChartFixedScale),
                format!("{value} outside {FIXED_SCALE_MIN}..={FIXED_SCALE_MAX}"),
            ));
        };
        self.current.fixed_scale_value = valid;
        self.persist(PreferenceKey::ChartFixedScale, Value::from(valid.get()))
    }

    pub fn set_fixed_scale_unit(&mut self, unit: SizeUnit) -> Result<()> {
        self.current.fixed_scale_unit = unit;
        self.persist(PreferenceKey::ChartFixedScaleSize, Value::from(unit.key()))
    }

    pub fn set_unit_base(&mut self, base: UnitBase) -> Result<()> {
        self.current.unit_base = base;
        self.persist(PreferenceKey::Base, Value::from(base.key()))
    }

    /// Refuses negative counts without touching the current value.
    pub fn set_process_row_count(&mut self, count: i64) -> Result<()> {
        let Ok(valid) = usize::try_from(count) else {
            return Err(NetpanelError::invalid_preference(
                self.keys.get(PreferenceKey::Processes),
                format!("{count} is negative"),
            ));
        };
        self.current.process_row_count = valid;
        self.persist(PreferenceKey::Processes, Value::from(valid))
    }

    pub fn set_public_ip_visible(&mut self, visible: bool) -> Result<()> {
        self.current.public_ip_visible = visible;
        self.persist(PreferenceKey::PublicIp, Value::from(visible))
    }

    /// Parse `raw` for `key` and apply it through the matching setter.
    pub fn set_from_str(&mut self, key: PreferenceKey, raw: &str) -> Result<()> {
        let bad = |expected: &str| {
            NetpanelError::invalid_preference(
                self.keys.get(key),
                format!("{raw:?} is not {expected}"),
            )
        };
        match key {
            PreferenceKey::UploadColor => {
                let color = ColorChoice::from_key(raw).ok_or_else(|| bad("a palette key"))?;
                self.set_upload_color(color)
            }
            PreferenceKey::DownloadColor => {
                let color = ColorChoice::from_key(raw).ok_or_else(|| bad("a palette key"))?;
                self.set_download_color(color)
            }
            PreferenceKey::ReverseOrder => {
                let v = raw.parse().map_err(|_| bad("true or false"))?;
                self.set_reverse_chart_order(v)
            }
            PreferenceKey::ChartScale => {
                let mode = ScaleMode::from_key(raw).ok_or_else(|| bad("none, percentage or fixed"))?;
                self.set_chart_scale_mode(mode)
            }
            PreferenceKey::ChartFixedScale => {
                let v = raw.parse().map_err(|_| bad("an integer"))?;
                self.set_fixed_scale_value(v)
            }
            PreferenceKey::ChartFixedScaleSize => {
                let unit = SizeUnit::from_key(raw).ok_or_else(|| bad("B, KB, MB, GB or TB"))?;
                self.set_fixed_scale_unit(unit)
            }
            PreferenceKey::Base => {
                let base = UnitBase::from_key(raw).ok_or_else(|| bad("byte or bit"))?;
                self.set_unit_base(base)
            }
            PreferenceKey::Processes => {
                let v = raw.parse().map_err(|_| bad("an integer"))?;
                self.set_process_row_count(v)
            }
            PreferenceKey::PublicIp => {
                let v = raw.parse().map_err(|_| bad("true or false"))?;
                self.set_public_ip_visible(v)
            }
        }
    }

    /// Current value of `key` rendered the way it is stored.
    #[must_use]
    pub fn display_value(&self, key: PreferenceKey) -> String {
        let p = &self.current;
        match key {
            PreferenceKey::UploadColor => p.upload_color.to_string(),
            PreferenceKey::DownloadColor => p.download_color.to_string(),
            PreferenceKey::ReverseOrder => p.reverse_chart_order.to_string(),
            PreferenceKey::ChartScale => p.chart_scale_mode.to_string(),
            PreferenceKey::ChartFixedScale => p.fixed_scale_value.to_string(),
            PreferenceKey::ChartFixedScaleSize => p.fixed_scale_unit.to_string(),
            PreferenceKey::Base => p.unit_base.to_string(),
            PreferenceKey::Processes => p.process_row_count.to_string(),
            PreferenceKey::PublicIp => p.public_ip_visible.to_string(),
        }
    }
}
