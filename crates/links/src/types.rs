use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::error::Error;

/// Supported chat platforms. Adding a platform means adding a variant here
/// and a constructor arm in the link factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Telegram,
    Zalo,
}

impl Platform {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Zalo => "zalo",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(Self::Telegram),
            "zalo" => Ok(Self::Zalo),
            other => Err(Error::UnknownPlatform {
                platform: other.to_string(),
            }),
        }
    }
}

/// Identity of one runtime adapter slot. At most one live link may exist
/// per key at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub tenant_id: i64,
    pub platform: Platform,
}

impl std::fmt::Display for LinkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.platform)
    }
}

/// Persisted integration record for one tenant/platform pair.
///
/// The `key_*` slots are opaque per-platform credential fields. Telegram
/// uses `key_1` for the bot token; Zalo uses `key_1..key_6` for app id,
/// app secret, webhook secret, access token, refresh token, and the token
/// expiry timestamp (unix seconds).
#[derive(Clone, Serialize, Deserialize)]
pub struct Integration {
    pub tenant_id: i64,
    pub platform: Platform,
    pub enabled: bool,
    pub key_1: Option<String>,
    pub key_2: Option<String>,
    pub key_3: Option<String>,
    pub key_4: Option<String>,
    pub key_5: Option<String>,
    pub key_6: Option<String>,
}

impl Integration {
    #[must_use]
    pub fn link_key(&self) -> LinkKey {
        LinkKey {
            tenant_id: self.tenant_id,
            platform: self.platform,
        }
    }

    /// Non-empty value of a credential slot (1-based), if present.
    #[must_use]
    pub fn slot(&self, n: usize) -> Option<&str> {
        let value = match n {
            1 => &self.key_1,
            2 => &self.key_2,
            3 => &self.key_3,
            4 => &self.key_4,
            5 => &self.key_5,
            6 => &self.key_6,
            _ => &None,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }
}

impl std::fmt::Debug for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integration")
            .field("tenant_id", &self.tenant_id)
            .field("platform", &self.platform)
            .field("enabled", &self.enabled)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

/// OAuth token state embedded in an integration's credential slots.
/// Mutated only by the refresh routine.
#[derive(Clone)]
pub struct TokenState {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    /// Unix timestamp (seconds) when the access token expires.
    pub expires_at: u64,
}

impl TokenState {
    /// True when the token is inside the refresh buffer of its expiry and
    /// must be exchanged before use.
    #[must_use]
    pub fn needs_refresh(&self, now: u64, buffer_secs: u64) -> bool {
        now >= self.expires_at.saturating_sub(buffer_secs)
    }
}

impl std::fmt::Debug for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenState")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// Secrets never leave the struct through Serialize by accident; expose is
// explicit at the persistence boundary.
impl TokenState {
    #[must_use]
    pub fn access_token_str(&self) -> &str {
        self.access_token.expose_secret()
    }
}
