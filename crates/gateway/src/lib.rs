//! HTTP edge and persistence for the link subsystem.
//!
//! Hosts the shared webhook listener that all Zalo tenants deliver into,
//! the health route, and the SQLite-backed implementations of the store
//! traits the adapters consume.

pub mod config;
pub mod server;
pub mod state;
pub mod store;

pub use {
    config::GatewayConfig,
    server::{build_router, serve},
    state::AppState,
    store::{SqliteCustomerStore, SqliteIntegrationStore},
};
