//! Webhook correlation and authenticity checks.
//!
//! All tenants share one HTTP listener, so each inbound event must be
//! correlated to its owning tenant through the app-id table and proven
//! authentic before anything is written to the store.

use std::{
    collections::HashMap,
    sync::RwLock,
};

use {
    hmac::{Hmac, Mac},
    secrecy::Secret,
    serde::{Deserialize, Deserializer},
    sha2::Sha256,
    tracing::warn,
};

type HmacSha256 = Hmac<Sha256>;

/// Owner of one webhook app id: the tenant and the secret its events are
/// signed with.
#[derive(Clone)]
pub struct WebhookRoute {
    pub tenant_id: i64,
    pub secret: Secret<String>,
}

/// Correlation table `external app id -> owning tenant + webhook secret`,
/// shared mutable state across all tenants on the listener. Entries are
/// registered when a link starts and removed when it stops, so a lookup
/// miss also rejects events for disabled integrations.
#[derive(Default)]
pub struct WebhookTable {
    routes: RwLock<HashMap<String, WebhookRoute>>,
}

impl WebhookTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, app_id: &str, tenant_id: i64, secret: Secret<String>) {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes.insert(app_id.to_string(), WebhookRoute { tenant_id, secret });
    }

    /// Remove the entry for `app_id`. Returns `false` when no entry existed,
    /// which makes repeated stops a no-op.
    pub fn remove(&self, app_id: &str) -> bool {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes.remove(app_id).is_some()
    }

    #[must_use]
    pub fn lookup(&self, app_id: &str) -> Option<WebhookRoute> {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        routes.get(app_id).cloned()
    }
}

/// Verify a webhook signature.
///
/// The signed string is `app_id || raw_body || timestamp`; the expected
/// value is its hex-encoded HMAC-SHA256 under the tenant's webhook secret.
#[must_use]
pub fn verify_signature(
    app_id: &str,
    raw_body: &[u8],
    timestamp: &str,
    secret: &str,
    provided: &str,
) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("failed to create HMAC");
            return false;
        },
    };

    mac.update(app_id.as_bytes());
    mac.update(raw_body);
    mac.update(timestamp.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    // Constant-time comparison to prevent timing attacks.
    constant_time_eq(&computed, provided)
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// The platform event types that carry an inbound customer text message.
pub const EVENT_USER_SEND_TEXT: &str = "user_send_text";

/// Parsed webhook payload. Fields beyond these are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub app_id: String,
    pub event_name: String,
    /// The platform sends the timestamp either as a string or a number.
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: String,
    #[serde(default)]
    pub sender: Option<EventSender>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSender {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub text: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}
