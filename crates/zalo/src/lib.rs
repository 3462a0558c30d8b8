//! Zalo Official Account link adapter.
//!
//! Webhook-style platform: inbound events arrive on one shared HTTP
//! listener for all tenants and are correlated to the owning tenant via an
//! app-id table, with HMAC-SHA256 signature verification before any store
//! write. Outbound calls go through an OAuth access token that is refreshed
//! proactively ahead of expiry.

pub mod config;
pub mod link;
pub mod service;
pub mod webhook;

pub use {
    config::ZaloCredentials,
    link::ZaloLink,
    service::{REFRESH_BUFFER_SECS, ZaloService},
    webhook::{WebhookEnvelope, WebhookRoute, WebhookTable, verify_signature},
};
