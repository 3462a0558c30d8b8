//! Telegram link adapter.
//!
//! Connects one bot per tenant via the Telegram Bot API (long polling),
//! normalizes inbound messages into the tenant's customer/message model,
//! and sends agent replies back out.

pub mod bot;
pub mod config;
pub mod inbound;
pub mod link;

pub use {bot::start_link, config::TelegramCredentials, link::TelegramLink};
