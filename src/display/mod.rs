//! Display-side derivations: unit formatting, chart scaling, tri-state fields
//! and the published view types.

pub mod field;
pub mod scale;
pub mod state;
pub mod units;
