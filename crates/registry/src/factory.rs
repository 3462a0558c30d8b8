use std::sync::Arc;

use async_trait::async_trait;

use {
    omnidesk_links::{Error, Integration, Link, Platform, Result, store::CustomerStore},
    omnidesk_telegram::TelegramCredentials,
    omnidesk_zalo::ZaloService,
};

/// Constructs the adapter for an integration. The registry goes through
/// this seam so lifecycle logic stays independent of the platform set.
#[async_trait]
pub trait LinkFactory: Send + Sync {
    async fn build(&self, integration: &Integration) -> Result<Arc<dyn Link>>;
}

/// Production factory over the closed set of supported platforms. Adding a
/// platform means adding a match arm here, not editing the registry.
pub struct PlatformLinkFactory {
    customers: Arc<dyn CustomerStore>,
    zalo: Arc<ZaloService>,
}

impl PlatformLinkFactory {
    #[must_use]
    pub fn new(customers: Arc<dyn CustomerStore>, zalo: Arc<ZaloService>) -> Self {
        Self { customers, zalo }
    }
}

#[async_trait]
impl LinkFactory for PlatformLinkFactory {
    async fn build(&self, integration: &Integration) -> Result<Arc<dyn Link>> {
        match integration.platform {
            Platform::Telegram => {
                let credentials = TelegramCredentials::from_integration(integration)?;
                let link = omnidesk_telegram::start_link(
                    integration.tenant_id,
                    credentials,
                    Arc::clone(&self.customers),
                )
                .await
                .map_err(|e| Error::store("start telegram link", e))?;
                Ok(Arc::new(link))
            },
            Platform::Zalo => {
                let link = self.zalo.start_link(integration)?;
                Ok(Arc::new(link))
            },
        }
    }
}
