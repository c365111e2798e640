//! Property-based tests for formatting, history and gate invariants.
//!
//! Uses `proptest` to check that arbitrary inputs keep the unit ladder
//! monotonic, readings re-parse within their stated tolerance, histories stay
//! bounded and FIFO, and a hidden presenter never repaints after its first
//! usage sample.

use std::sync::Arc;

use proptest::prelude::*;

use crate::display::scale::{FIXED_SCALE_MAX, FIXED_SCALE_MIN, FixedScaleValue};
use crate::display::units::{Context, UnitBase, format, scale};
use crate::preferences::store::{DashboardId, MemoryStore};
use crate::presenter::reset::ResetBus;
use crate::presenter::sink::NullSink;
use crate::presenter::{Presenter, PresenterOptions};
use crate::telemetry::events::SourceEvent;
use crate::telemetry::ring::RingBuffer;
use crate::telemetry::samples::{ConnectivitySample, ProcessSample, UsageSample};

// ──────────────────── strategies ────────────────────

fn arb_base() -> impl Strategy<Value = UnitBase> {
    prop_oneof![Just(UnitBase::Byte), Just(UnitBase::Bit)]
}

fn arb_bytes() -> impl Strategy<Value = i64> {
    prop_oneof![0i64..4096, 0i64..(1 << 40), 0i64..(i64::MAX / 16)]
}

/// Counts just below and at each 1024 boundary, plus small offsets.
fn arb_boundary_bytes() -> impl Strategy<Value = i64> {
    (1u32..6, -3i64..3).prop_map(|(power, offset)| (1i64 << (10 * power)) + offset)
}

fn arb_usage() -> impl Strategy<Value = UsageSample> {
    (arb_bytes(), arb_bytes(), any::<bool>()).prop_map(|(up, down, link_up)| UsageSample {
        upload_bytes_per_sec: up,
        download_bytes_per_sec: down,
        link_up,
        ..UsageSample::default()
    })
}

fn arb_connectivity() -> impl Strategy<Value = Option<ConnectivitySample>> {
    proptest::option::of(
        (proptest::option::of(any::<bool>()), proptest::option::of(0.0f64..500.0)).prop_map(
            |(reachable, latency_ms)| ConnectivitySample {
                reachable,
                latency_ms,
            },
        ),
    )
}

fn arb_processes() -> impl Strategy<Value = Vec<ProcessSample>> {
    proptest::collection::vec(
        (1u32..60_000, arb_bytes(), arb_bytes()).prop_map(|(pid, up, down)| ProcessSample {
            pid,
            name: format!("p{pid}"),
            upload_bytes_per_sec: up,
            download_bytes_per_sec: down,
        }),
        0..12,
    )
}

fn arb_stream_event() -> impl Strategy<Value = SourceEvent> {
    prop_oneof![
        arb_usage().prop_map(SourceEvent::Usage),
        arb_connectivity().prop_map(|sample| SourceEvent::Connectivity { sample }),
        arb_processes().prop_map(|rows| SourceEvent::Processes { rows }),
    ]
}

fn hidden_presenter() -> Presenter<NullSink> {
    Presenter::new(
        DashboardId::new("prop"),
        Arc::new(MemoryStore::new()),
        &ResetBus::new(),
        NullSink,
        PresenterOptions::default(),
    )
    .0
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A larger count never picks a smaller unit.
    #[test]
    fn unit_step_is_monotonic(a in arb_bytes(), b in arb_bytes(), base in arb_base()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(scale(lo, base).step <= scale(hi, base).step);
    }

    /// Re-parsing a reading lands within the advertised rounding tolerance.
    #[test]
    fn reading_reparses_within_tolerance(bytes in arb_bytes(), base in arb_base(), rate in any::<bool>()) {
        let context = if rate { Context::Rate } else { Context::Total };
        let reading = format(bytes, context, base);
        let parsed = reading.approx_bytes(base).expect("reading should re-parse");
        let bound = scale(bytes, base).tolerance() / base.per_byte();
        let slack = (bytes as f64).abs() * 1e-12 + 1e-9;
        prop_assert!(
            (parsed - bytes as f64).abs() <= bound + slack,
            "{reading} -> {parsed}, expected {bytes} ± {bound}"
        );
    }

    /// Below the largest unit the rendered value never reaches 1024.
    #[test]
    fn rendered_value_stays_below_next_unit(
        bytes in prop_oneof![arb_bytes(), arb_boundary_bytes()],
        base in arb_base(),
    ) {
        let reading = format(bytes, Context::Total, base);
        let value: f64 = reading.value.parse().expect("reading value should parse");
        if reading.unit != "PB" && reading.unit != "Pb" {
            prop_assert!(value < 1024.0, "{reading}");
        }
    }

    /// Negative counts render exactly like zero.
    #[test]
    fn negative_counts_format_as_zero(bytes in i64::MIN..0, base in arb_base()) {
        prop_assert_eq!(format(bytes, Context::Rate, base), format(0, Context::Rate, base));
    }

    /// Length never exceeds capacity and contents are the newest values in order.
    #[test]
    fn ring_buffer_keeps_newest_in_order(
        capacity in 1usize..120,
        values in proptest::collection::vec(-1e6f64..1e6, 0..300),
    ) {
        let mut ring = RingBuffer::new(capacity);
        for v in &values {
            ring.append(*v);
            prop_assert!(ring.len() <= capacity);
        }
        let start = values.len().saturating_sub(capacity);
        prop_assert_eq!(ring.snapshot(), values[start..].to_vec());
    }

    /// Loading clamps and the setter refuses exactly the out-of-range values.
    #[test]
    fn fixed_scale_value_bounds(value in any::<i64>()) {
        let clamped = FixedScaleValue::clamped(value).get();
        prop_assert!((FIXED_SCALE_MIN..=FIXED_SCALE_MAX).contains(&clamped));
        let in_range = (i64::from(FIXED_SCALE_MIN)..=i64::from(FIXED_SCALE_MAX)).contains(&value);
        prop_assert_eq!(FixedScaleValue::new(value).is_some(), in_range);
    }

    /// While hidden, only the first sample of each stream is published; the
    /// latency window still sees every probe.
    #[test]
    fn hidden_presenter_publishes_each_stream_once(
        events in proptest::collection::vec(arb_stream_event(), 1..80),
    ) {
        let presenter = hidden_presenter();
        let mut first_usage = None;
        let mut probes = 0usize;
        for event in &events {
            presenter.apply_event(event);
            match event {
                SourceEvent::Usage(_) if first_usage.is_none() => {
                    first_usage = Some(presenter.display_state().usage);
                }
                SourceEvent::Connectivity { .. } => probes += 1,
                _ => {}
            }
        }

        let stats = presenter.gate_stats();
        prop_assert!(stats.usage_published <= 1);
        prop_assert!(stats.connectivity_published <= 1);
        prop_assert!(stats.processes_published <= 1);
        prop_assert_eq!(presenter.latency_history().len(), probes.min(90));
        if let Some(first) = first_usage {
            prop_assert_eq!(presenter.display_state().usage, first);
        }
        prop_assert!(presenter.display_state().processes.rows.len() <= 8);
    }
}
