//! Persisted display preferences: a namespaced key-value store and the typed
//! adapter the presenter reads from and writes through.

pub mod display;
pub mod store;
