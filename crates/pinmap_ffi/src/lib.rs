//! Flutter-facing bindings for pinmap core.

pub mod api;
