//! Runtime registry of platform links.
//!
//! Owns the map of active adapters keyed by `(tenant, platform)`, performs
//! hot-swap and teardown on integration changes, and exposes the uniform
//! outbound dispatch entry point.

pub mod factory;
pub mod registry;

pub use {
    factory::{LinkFactory, PlatformLinkFactory},
    registry::LinkRegistry,
};
