use secrecy::Secret;

use omnidesk_links::{Error, Integration, Result, TokenState};

/// Static Zalo OA credentials, read from the integration's first three
/// credential slots.
#[derive(Clone)]
pub struct ZaloCredentials {
    pub app_id: String,
    pub app_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
}

impl ZaloCredentials {
    pub fn from_integration(integration: &Integration) -> Result<Self> {
        let app_id = integration
            .slot(1)
            .ok_or_else(|| Error::missing_credentials("zalo app id (key_1) is required"))?;
        let app_secret = integration
            .slot(2)
            .ok_or_else(|| Error::missing_credentials("zalo app secret (key_2) is required"))?;
        let webhook_secret = integration
            .slot(3)
            .ok_or_else(|| Error::missing_credentials("zalo webhook secret (key_3) is required"))?;
        Ok(Self {
            app_id: app_id.to_string(),
            app_secret: Secret::new(app_secret.to_string()),
            webhook_secret: Secret::new(webhook_secret.to_string()),
        })
    }
}

impl std::fmt::Debug for ZaloCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZaloCredentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

/// OAuth token state from slots 4..6 (access token, refresh token, expiry
/// unix seconds).
pub fn token_state(integration: &Integration) -> Result<TokenState> {
    let access_token = integration
        .slot(4)
        .ok_or_else(|| Error::missing_credentials("zalo access token (key_4) is required"))?;
    let refresh_token = integration
        .slot(5)
        .ok_or_else(|| Error::missing_credentials("zalo refresh token (key_5) is required"))?;
    let expires_at = integration
        .slot(6)
        .ok_or_else(|| Error::missing_credentials("zalo token expiry (key_6) is required"))?
        .parse::<u64>()
        .map_err(|e| Error::invalid_credentials(format!("zalo token expiry (key_6): {e}")))?;
    Ok(TokenState {
        access_token: Secret::new(access_token.to_string()),
        refresh_token: Secret::new(refresh_token.to_string()),
        expires_at,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, omnidesk_links::Platform};

    fn integration() -> Integration {
        Integration {
            tenant_id: 9,
            platform: Platform::Zalo,
            enabled: true,
            key_1: Some("app-1".into()),
            key_2: Some("app-secret".into()),
            key_3: Some("hook-secret".into()),
            key_4: Some("access".into()),
            key_5: Some("refresh".into()),
            key_6: Some("1700000000".into()),
        }
    }

    #[test]
    fn parses_full_credential_set() {
        let creds = ZaloCredentials::from_integration(&integration()).unwrap();
        assert_eq!(creds.app_id, "app-1");

        let token = token_state(&integration()).unwrap();
        assert_eq!(token.expires_at, 1_700_000_000);
        assert_eq!(token.access_token_str(), "access");
    }

    #[test]
    fn each_missing_slot_is_a_configuration_error() {
        for clear in 1..=5usize {
            let mut i = integration();
            match clear {
                1 => i.key_1 = None,
                2 => i.key_2 = None,
                3 => i.key_3 = None,
                4 => i.key_4 = None,
                _ => i.key_5 = None,
            }
            let result = if clear <= 3 {
                ZaloCredentials::from_integration(&i).map(|_| ())
            } else {
                token_state(&i).map(|_| ())
            };
            assert!(matches!(
                result.unwrap_err(),
                Error::MissingCredentials { .. }
            ));
        }
    }

    #[test]
    fn non_numeric_expiry_is_invalid() {
        let mut i = integration();
        i.key_6 = Some("soon".into());
        assert!(matches!(
            token_state(&i).unwrap_err(),
            Error::InvalidCredentials { .. }
        ));
    }
}
