//! Provider-agnostic chat model core.
//!
//! A conversation is held in one canonical representation ([`models`]) and
//! translated per vendor by an [`providers::base::Adapter`]. The
//! [`dispatch::Dispatcher`] resolves the active adapter through the
//! [`providers::registry::AdapterRegistry`], sends the vendor payload over a
//! pluggable transport, and hands canonical deltas back to the caller in
//! arrival order. The caller never sees which vendor is active.

pub mod dispatch;
pub mod errors;
pub mod models;
pub mod providers;
