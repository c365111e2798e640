//! Y-axis ceiling resolution for the bandwidth chart.
//!
//! Three modes:
//! - `None`: the renderer fits to the largest sample in its current frame.
//! - `Percentage`: values are drawn relative to a reference link capacity
//!   supplied from outside; without one this degrades to `None`.
//! - `Fixed`: a user-chosen absolute cap. Samples above it are clipped by the
//!   renderer, never altered here.

#![allow(missing_docs)]
#![allow(clippy::cast_precision_loss)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Smallest accepted fixed-scale value.
pub const FIXED_SCALE_MIN: u16 = 1;
/// Largest accepted fixed-scale value.
pub const FIXED_SCALE_MAX: u16 = 1023;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    #[default]
    None,
    Percentage,
    Fixed,
}

impl ScaleMode {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "none" => Some(Self::None),
            "percentage" => Some(Self::Percentage),
            "fixed" => Some(Self::Fixed),
            _ => None,
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Unit for the fixed-scale value. Multipliers are powers of 1024.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeUnit {
    B,
    KB,
    #[default]
    MB,
    GB,
    TB,
}

impl SizeUnit {
    pub const ALL: [Self; 5] = [Self::B, Self::KB, Self::MB, Self::GB, Self::TB];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::KB => "KB",
            Self::MB => "MB",
            Self::GB => "GB",
            Self::TB => "TB",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.key() == key)
    }

    #[must_use]
    pub const fn multiplier(self) -> u64 {
        match self {
            Self::B => 1,
            Self::KB => 1 << 10,
            Self::MB => 1 << 20,
            Self::GB => 1 << 30,
            Self::TB => 1 << 40,
        }
    }

    #[must_use]
    pub const fn to_bytes(self, value: u16) -> u64 {
        value as u64 * self.multiplier()
    }
}

impl fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A fixed-scale value already validated to lie in `1..=1023`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FixedScaleValue(u16);

impl FixedScaleValue {
    pub const DEFAULT: Self = Self(12);

    /// Accept a value inside the range, refuse anything else.
    #[must_use]
    pub fn new(value: i64) -> Option<Self> {
        u16::try_from(value)
            .ok()
            .filter(|v| (FIXED_SCALE_MIN..=FIXED_SCALE_MAX).contains(v))
            .map(Self)
    }

    /// Pull any value into range.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        let v = value.clamp(i64::from(FIXED_SCALE_MIN), i64::from(FIXED_SCALE_MAX));
        Self(u16::try_from(v).unwrap_or(FIXED_SCALE_MAX))
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl Default for FixedScaleValue {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for FixedScaleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Resolved chart ceiling handed to the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Ceiling {
    /// Defer to the caller: fit to the current frame's largest sample.
    #[default]
    Auto,
    /// Values are fractions of this link capacity (bytes/s).
    Percent { capacity: u64 },
    /// Absolute cap in bytes/s.
    Fixed { bytes: u64 },
}

impl Ceiling {
    /// The y-axis top the renderer should use for `observed`.
    ///
    /// `Auto` takes the series peak (0 for an empty or all-zero series).
    #[must_use]
    pub fn effective_peak(&self, observed: &[f64]) -> f64 {
        match self {
            Self::Auto => observed.iter().copied().fold(0.0, f64::max),
            Self::Percent { capacity } => *capacity as f64,
            Self::Fixed { bytes } => *bytes as f64,
        }
    }

    /// Position of `value` on the axis in `0.0..=1.0`. Values above the
    /// ceiling are clipped to 1.0.
    #[must_use]
    pub fn fraction(&self, value: f64, observed: &[f64]) -> f64 {
        let peak = self.effective_peak(observed);
        if peak <= 0.0 {
            return 0.0;
        }
        (value / peak).clamp(0.0, 1.0)
    }
}

/// Inputs for ceiling resolution. Rebuilt whenever a preference changes, so a
/// mode switch applies to the next ingested sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaleResolver {
    pub mode: ScaleMode,
    pub fixed_value: FixedScaleValue,
    pub fixed_unit: SizeUnit,
    /// Reference link capacity in bytes/s, supplied externally.
    pub reference_capacity: Option<u64>,
}

impl ScaleResolver {
    #[must_use]
    pub fn resolve(&self) -> Ceiling {
        match self.mode {
            ScaleMode::None => Ceiling::Auto,
            ScaleMode::Percentage => match self.reference_capacity {
                Some(capacity) if capacity > 0 => Ceiling::Percent { capacity },
                _ => Ceiling::Auto,
            },
            ScaleMode::Fixed => Ceiling::Fixed {
                bytes: self.fixed_unit.to_bytes(self.fixed_value.get()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(mode: ScaleMode) -> ScaleResolver {
        ScaleResolver {
            mode,
            ..ScaleResolver::default()
        }
    }

    #[test]
    fn fixed_mode_multiplies_value_by_unit() {
        let r = ScaleResolver {
            mode: ScaleMode::Fixed,
            fixed_value: FixedScaleValue::new(10).unwrap(),
            fixed_unit: SizeUnit::MB,
            reference_capacity: Some(1),
        };
        assert_eq!(
            r.resolve(),
            Ceiling::Fixed {
                bytes: 10 * 1024 * 1024
            }
        );
    }

    #[test]
    fn none_mode_defers_to_caller() {
        assert_eq!(resolver(ScaleMode::None).resolve(), Ceiling::Auto);
    }

    #[test]
    fn percentage_without_capacity_falls_back_to_auto() {
        assert_eq!(resolver(ScaleMode::Percentage).resolve(), Ceiling::Auto);
        let r = ScaleResolver {
            reference_capacity: Some(0),
            ..resolver(ScaleMode::Percentage)
        };
        assert_eq!(r.resolve(), Ceiling::Auto);
    }

    #[test]
    fn percentage_with_capacity_uses_it() {
        let r = ScaleResolver {
            reference_capacity: Some(125_000_000),
            ..resolver(ScaleMode::Percentage)
        };
        let c = r.resolve();
        assert_eq!(
            c,
            Ceiling::Percent {
                capacity: 125_000_000
            }
        );
        assert!((c.fraction(62_500_000.0, &[]) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn auto_peak_follows_observed_series() {
        let c = Ceiling::Auto;
        assert!((c.effective_peak(&[1.0, 9.0, 3.0]) - 9.0).abs() < f64::EPSILON);
        assert!(c.effective_peak(&[]).abs() < f64::EPSILON);
        assert!(c.fraction(5.0, &[]).abs() < f64::EPSILON);
    }

    #[test]
    fn fixed_ceiling_clips_fraction() {
        let c = Ceiling::Fixed { bytes: 100 };
        assert!((c.fraction(250.0, &[250.0]) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fixed_value_range_is_enforced() {
        assert!(FixedScaleValue::new(0).is_none());
        assert!(FixedScaleValue::new(1024).is_none());
        assert_eq!(FixedScaleValue::new(1023).map(FixedScaleValue::get), Some(1023));
        assert_eq!(FixedScaleValue::clamped(-4).get(), 1);
        assert_eq!(FixedScaleValue::clamped(90_000).get(), 1023);
    }

    #[test]
    fn keys_roundtrip() {
        for mode in [ScaleMode::None, ScaleMode::Percentage, ScaleMode::Fixed] {
            assert_eq!(ScaleMode::from_key(mode.key()), Some(mode));
        }
        for unit in SizeUnit::ALL {
            assert_eq!(SizeUnit::from_key(unit.key()), Some(unit));
        }
        assert_eq!(SizeUnit::from_key("XB"), None);
    }

    #[test]
    fn largest_fixed_scale_fits_in_u64() {
        assert_eq!(SizeUnit::TB.to_bytes(1023), 1023 * (1u64 << 40));
    }
}
