//! Flutter-facing bindings for GTracker core.

pub mod api;
