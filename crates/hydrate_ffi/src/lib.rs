//! Flutter-facing bindings for the Hydrate core.

pub mod api;
