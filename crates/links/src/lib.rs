//! Platform link core.
//!
//! Shared model for the link subsystem: the [`Link`] trait implemented by
//! each platform adapter, the [`Integration`] credential record, and the
//! store traits the adapters write through.

pub mod error;
pub mod link;
pub mod store;
pub mod types;

pub use {
    error::{Error, Result},
    link::Link,
    types::{Integration, LinkKey, Platform, TokenState},
};
