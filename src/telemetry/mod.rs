//! Inbound measurement types and the bounded history container they feed.

pub mod events;
pub mod ring;
pub mod samples;
