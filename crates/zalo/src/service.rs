use std::sync::Arc;

use {
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info, warn},
};

use omnidesk_links::{
    Error, Integration, Platform, Result, TokenState,
    store::{CustomerStore, IntegrationStore},
};

use crate::{
    config::{self, ZaloCredentials},
    link::ZaloLink,
    webhook::{EVENT_USER_SEND_TEXT, WebhookEnvelope, WebhookTable},
};

/// Proactive refresh margin: tokens inside this window of their expiry are
/// exchanged before use.
pub const REFRESH_BUFFER_SECS: u64 = 120;

const DEFAULT_API_BASE: &str = "https://openapi.zalo.me";
const DEFAULT_OAUTH_BASE: &str = "https://oauth.zaloapp.com";

/// Shared Zalo platform service: OAuth token lifecycle, the webhook
/// correlation table, and the outbound/profile API client. One instance
/// serves every tenant's link.
pub struct ZaloService {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    integrations: Arc<dyn IntegrationStore>,
    customers: Arc<dyn CustomerStore>,
    webhooks: WebhookTable,
}

impl ZaloService {
    #[must_use]
    pub fn new(
        integrations: Arc<dyn IntegrationStore>,
        customers: Arc<dyn CustomerStore>,
    ) -> Self {
        Self::with_bases(integrations, customers, DEFAULT_API_BASE, DEFAULT_OAUTH_BASE)
    }

    /// Construct with overridden API/OAuth endpoints (tests point these at a
    /// local mock server).
    #[must_use]
    pub fn with_bases(
        integrations: Arc<dyn IntegrationStore>,
        customers: Arc<dyn CustomerStore>,
        api_base: impl Into<String>,
        oauth_base: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            oauth_base: oauth_base.into(),
            integrations,
            customers,
            webhooks: WebhookTable::new(),
        }
    }

    #[must_use]
    pub fn webhooks(&self) -> &WebhookTable {
        &self.webhooks
    }

    /// Materialize the link for one tenant: validates the static credential
    /// slots and registers the webhook correlation entry so the shared
    /// listener starts accepting this app's events.
    pub fn start_link(self: &Arc<Self>, integration: &Integration) -> Result<ZaloLink> {
        let creds = ZaloCredentials::from_integration(integration)?;
        self.webhooks.register(
            &creds.app_id,
            integration.tenant_id,
            creds.webhook_secret.clone(),
        );
        info!(
            tenant_id = integration.tenant_id,
            app_id = %creds.app_id,
            "zalo link registered for webhook delivery"
        );
        Ok(ZaloLink {
            service: Arc::clone(self),
            tenant_id: integration.tenant_id,
            app_id: creds.app_id,
        })
    }

    /// Return a currently-valid access token for the tenant, refreshing it
    /// first when it is inside the expiry buffer.
    ///
    /// Called immediately before every outbound API call; tokens expire
    /// independently of send activity. A cached, still-fresh token is
    /// returned without network I/O. Refresh failure leaves the stored
    /// token state untouched.
    pub async fn ensure_access_token(&self, tenant_id: i64) -> Result<Secret<String>> {
        let integration = self
            .integrations
            .load(tenant_id, Platform::Zalo)
            .await
            .map_err(|e| Error::store("load zalo integration", e))?
            .ok_or_else(|| {
                Error::missing_credentials(format!("no zalo integration for tenant {tenant_id}"))
            })?;
        let token = config::token_state(&integration)?;

        if !token.needs_refresh(unix_now(), REFRESH_BUFFER_SECS) {
            return Ok(token.access_token);
        }

        let creds = ZaloCredentials::from_integration(&integration)?;
        let refreshed = self.refresh_token(&creds, &token).await?;
        self.integrations
            .persist_token_state(tenant_id, Platform::Zalo, &refreshed)
            .await
            .map_err(|e| Error::store("persist zalo token state", e))?;
        info!(
            tenant_id,
            expires_at = refreshed.expires_at,
            "zalo access token refreshed"
        );
        Ok(refreshed.access_token)
    }

    async fn refresh_token(
        &self,
        creds: &ZaloCredentials,
        current: &TokenState,
    ) -> Result<TokenState> {
        let url = format!("{}/v4/oa/access_token", self.oauth_base);
        let form = [
            ("app_id", creds.app_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token.expose_secret()),
        ];

        let resp = self
            .http
            .post(&url)
            .header("secret_key", creds.app_secret.expose_secret())
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::external("zalo token refresh request", e))?;

        if !resp.status().is_success() {
            return Err(Error::authentication(format!(
                "zalo token refresh rejected with status {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::external("zalo token refresh response", e))?;
        parse_token_response(&body)
    }

    /// Process one authenticated webhook event. The caller has already
    /// verified the signature and resolved the owning tenant.
    pub async fn handle_event(
        &self,
        tenant_id: i64,
        envelope: &WebhookEnvelope,
    ) -> anyhow::Result<()> {
        if envelope.event_name != EVENT_USER_SEND_TEXT {
            debug!(
                tenant_id,
                event = %envelope.event_name,
                "ignoring non-text zalo event"
            );
            return Ok(());
        }
        let Some(sender_id) = envelope
            .sender
            .as_ref()
            .map(|s| s.id.as_str())
            .filter(|id| !id.is_empty())
        else {
            debug!(tenant_id, "ignoring zalo event without sender id");
            return Ok(());
        };
        let Some(text) = envelope
            .message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .filter(|t| !t.is_empty())
        else {
            debug!(tenant_id, "ignoring zalo event without text body");
            return Ok(());
        };

        let access_token = self.ensure_access_token(tenant_id).await?;
        // Profile resolution is best-effort; the sender id stands in for a
        // display name when the lookup fails.
        let (display_name, avatar) = self
            .fetch_profile(access_token.expose_secret(), sender_id)
            .await
            .unwrap_or_else(|| (sender_id.to_string(), None));

        let customer_id = self
            .customers
            .ensure_customer(Platform::Zalo, sender_id, &display_name, avatar.as_deref(), tenant_id)
            .await?;
        self.customers
            .append_message(text, tenant_id, customer_id, None)
            .await?;
        info!(tenant_id, customer_id, "recorded inbound zalo message");
        Ok(())
    }

    async fn fetch_profile(
        &self,
        access_token: &str,
        user_id: &str,
    ) -> Option<(String, Option<String>)> {
        let url = format!("{}/v2.0/oa/getprofile", self.api_base);
        let data = serde_json::json!({ "user_id": user_id }).to_string();

        let resp = match self
            .http
            .get(&url)
            .header("access_token", access_token)
            .query(&[("data", data.as_str())])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!(user_id, error = %e, "zalo profile fetch failed");
                return None;
            },
        };
        let body: serde_json::Value = resp.json().await.ok()?;
        if body["error"].as_i64().unwrap_or(-1) != 0 {
            debug!(
                user_id,
                error_code = body["error"].as_i64().unwrap_or(-1),
                "zalo profile api returned an error"
            );
            return None;
        }

        let display_name = body["data"]["display_name"].as_str()?.to_string();
        let avatar = body["data"]["avatar"]
            .as_str()
            .filter(|a| !a.is_empty())
            .map(ToString::to_string);
        Some((display_name, avatar))
    }

    /// Send a text message to a platform-side user. `true` only on explicit
    /// platform acknowledgement.
    pub async fn send_message(
        &self,
        tenant_id: i64,
        external_chat_id: &str,
        content: &str,
    ) -> bool {
        let token = match self.ensure_access_token(tenant_id).await {
            Ok(token) => token,
            Err(e) => {
                warn!(tenant_id, error = %e, "zalo send aborted: access token unavailable");
                return false;
            },
        };

        let url = format!("{}/v3.0/oa/message/cs", self.api_base);
        let body = serde_json::json!({
            "recipient": { "user_id": external_chat_id },
            "message": { "text": content },
        });

        let resp = match self
            .http
            .post(&url)
            .header("access_token", token.expose_secret())
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(tenant_id, chat_id = external_chat_id, error = %e, "zalo send failed");
                return false;
            },
        };
        if !resp.status().is_success() {
            warn!(
                tenant_id,
                chat_id = external_chat_id,
                status = %resp.status(),
                "zalo message api returned non-success status"
            );
            return false;
        }

        match resp.json::<serde_json::Value>().await {
            Ok(ack) if ack["error"].as_i64() == Some(0) => {
                info!(tenant_id, chat_id = external_chat_id, "zalo outbound message sent");
                true
            },
            Ok(ack) => {
                warn!(
                    tenant_id,
                    chat_id = external_chat_id,
                    error_code = ack["error"].as_i64().unwrap_or(-1),
                    "zalo message api rejected send"
                );
                false
            },
            Err(e) => {
                warn!(tenant_id, chat_id = external_chat_id, error = %e, "zalo send ack unreadable");
                false
            },
        }
    }
}

fn parse_token_response(body: &serde_json::Value) -> Result<TokenState> {
    let access_token = body["access_token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::authentication("token response missing access_token"))?;
    let refresh_token = body["refresh_token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::authentication("token response missing refresh_token"))?;
    // The platform serializes expires_in as a string.
    let expires_in = match &body["expires_in"] {
        serde_json::Value::String(s) => s.parse::<u64>().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    }
    .ok_or_else(|| Error::authentication("token response missing expires_in"))?;

    Ok(TokenState {
        access_token: Secret::new(access_token.to_string()),
        refresh_token: Secret::new(refresh_token.to_string()),
        expires_at: unix_now() + expires_in,
    })
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
