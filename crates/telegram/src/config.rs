use secrecy::{ExposeSecret, Secret};

use omnidesk_links::{Error, Integration, Result};

/// Credentials for a single Telegram bot, read from the integration's
/// `key_1` slot.
#[derive(Clone)]
pub struct TelegramCredentials {
    pub token: Secret<String>,
}

impl TelegramCredentials {
    pub fn from_integration(integration: &Integration) -> Result<Self> {
        let token = integration
            .slot(1)
            .ok_or_else(|| Error::missing_credentials("telegram bot token (key_1) is required"))?;
        Ok(Self {
            token: Secret::new(token.to_string()),
        })
    }

    #[must_use]
    pub(crate) fn token_str(&self) -> &str {
        self.token.expose_secret()
    }
}

impl std::fmt::Debug for TelegramCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramCredentials")
            .field("token", &"[REDACTED]")
            .finish()
    }
}
