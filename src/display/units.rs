//! Human-scaled byte and bit readings for rates and cumulative totals.
//!
//! Steps use a 1024 divisor. The chosen step depends only on the raw
//! magnitude, so a larger input never selects a smaller unit.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use std::fmt;

use serde::{Deserialize, Serialize};

const STEP_DIVISOR: f64 = 1024.0;
const BYTE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
const BIT_UNITS: [&str; 6] = ["b", "Kb", "Mb", "Gb", "Tb", "Pb"];
const STEP_DECIMALS: [usize; 6] = [0, 0, 1, 2, 2, 2];
const RATE_SUFFIX: &str = "/s";

/// Whether readings count bytes or bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitBase {
    #[default]
    Byte,
    Bit,
}

impl UnitBase {
    /// Stable key used by the preference store.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Bit => "bit",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "byte" => Some(Self::Byte),
            "bit" => Some(Self::Bit),
            _ => None,
        }
    }

    const fn units(self) -> &'static [&'static str; 6] {
        match self {
            Self::Byte => &BYTE_UNITS,
            Self::Bit => &BIT_UNITS,
        }
    }

    /// Raw units per byte: 1 for bytes, 8 for bits.
    #[must_use]
    pub const fn per_byte(self) -> f64 {
        match self {
            Self::Byte => 1.0,
            Self::Bit => 8.0,
        }
    }
}

impl fmt::Display for UnitBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Instantaneous rate (`/s` suffix) or cumulative total (no suffix).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Rate,
    Total,
}

/// Intermediate scaling result before string rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaled {
    /// Value expressed in the chosen unit, unrounded.
    pub amount: f64,
    /// Index into the unit ladder (0 = B or b).
    pub step: usize,
    /// Number of decimals rendered for this step.
    pub decimals: usize,
}

impl Scaled {
    /// Size of one unit at this step, in raw bytes or bits.
    #[must_use]
    pub fn multiplier(&self) -> f64 {
        step_multiplier(self.step)
    }

    /// Maximum absolute rounding error of the rendered value, in raw bytes or bits.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        0.5 * 10f64.powi(-(self.decimals as i32)) * self.multiplier()
    }
}

/// A rendered `(value, unit)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub value: String,
    pub unit: String,
}

impl Reading {
    /// Reading shown before any sample arrived.
    #[must_use]
    pub fn zero(context: Context, base: UnitBase) -> Self {
        format(0, context, base)
    }

    /// Re-parse into raw bytes. `None` when value or unit are not recognized.
    #[must_use]
    pub fn approx_bytes(&self, base: UnitBase) -> Option<f64> {
        let value: f64 = self.value.parse().ok()?;
        let unit = self.unit.strip_suffix(RATE_SUFFIX).unwrap_or(&self.unit);
        let step = base.units().iter().position(|u| *u == unit)?;
        Some(value * step_multiplier(step) / base.per_byte())
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

#[must_use]
pub fn step_multiplier(step: usize) -> f64 {
    STEP_DIVISOR.powi(step as i32)
}

fn round_to(amount: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (amount * factor).round() / factor
}

/// Choose the unit step for a byte count. Negative input counts as zero.
///
/// An amount that would render as 1024 after rounding moves up one step, so
/// `1024^2 - 1` bytes reads "1.0 MB" rather than "1024 KB".
#[must_use]
pub fn scale(bytes: i64, base: UnitBase) -> Scaled {
    let raw = bytes.max(0) as f64 * base.per_byte();
    let mut step = 0;
    while step + 1 < BYTE_UNITS.len() && raw >= step_multiplier(step + 1) {
        step += 1;
    }
    if step + 1 < BYTE_UNITS.len()
        && round_to(raw / step_multiplier(step), STEP_DECIMALS[step]) >= STEP_DIVISOR
    {
        step += 1;
    }
    Scaled {
        amount: raw / step_multiplier(step),
        step,
        decimals: STEP_DECIMALS[step],
    }
}

/// Render a byte count for the given context and base.
#[must_use]
pub fn format(bytes: i64, context: Context, base: UnitBase) -> Reading {
    let scaled = scale(bytes, base);
    let unit = base.units()[scaled.step];
    Reading {
        value: format!("{:.*}", scaled.decimals, scaled.amount),
        unit: match context {
            Context::Rate => format!("{unit}{RATE_SUFFIX}"),
            Context::Total => unit.to_string(),
        },
    }
}
