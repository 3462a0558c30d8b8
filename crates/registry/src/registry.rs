use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use tracing::{debug, info, warn};

use omnidesk_links::{
    Error, Integration, Link, LinkKey, Platform, Result, store::IntegrationStore,
};

use crate::factory::LinkFactory;

/// Registry of all live links, at most one per `(tenant, platform)` key.
///
/// The map itself is guarded by a `RwLock` that is never held across an
/// await; lifecycle operations for one key serialize on a per-key async
/// lock so a slow adapter start for one tenant never blocks the others.
pub struct LinkRegistry {
    links: RwLock<HashMap<LinkKey, Arc<dyn Link>>>,
    key_locks: Mutex<HashMap<LinkKey, Arc<tokio::sync::Mutex<()>>>>,
    integrations: Arc<dyn IntegrationStore>,
    factory: Arc<dyn LinkFactory>,
}

impl LinkRegistry {
    #[must_use]
    pub fn new(integrations: Arc<dyn IntegrationStore>, factory: Arc<dyn LinkFactory>) -> Self {
        Self {
            links: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            integrations,
            factory,
        }
    }

    /// (Re)materialize the link for an integration.
    ///
    /// An existing link for the key is stopped and removed before the new
    /// adapter is constructed, so two adapters for the same key are never
    /// simultaneously active. When construction fails the key is left
    /// absent and callers see the integration as "not running".
    pub async fn start(&self, integration: &Integration) -> Result<()> {
        let key = integration.link_key();
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        self.stop_and_remove(key).await;

        let link = self.factory.build(integration).await?;
        let mut links = self.links.write().unwrap_or_else(|e| e.into_inner());
        links.insert(key, link);
        info!(tenant_id = key.tenant_id, platform = %key.platform, "link started");
        Ok(())
    }

    /// React to an integration create/update/enable/disable.
    pub async fn apply_update(&self, integration: &Integration) -> Result<()> {
        if integration.enabled {
            self.start(integration).await
        } else {
            let key = integration.link_key();
            let lock = self.key_lock(key);
            let _guard = lock.lock().await;
            self.stop_and_remove(key).await;
            Ok(())
        }
    }

    /// Start every enabled integration at process boot. One adapter's
    /// construction failure must not prevent the others from starting.
    pub async fn start_all_enabled(&self) -> Result<()> {
        let integrations = self
            .integrations
            .load_enabled()
            .await
            .map_err(|e| Error::store("load enabled integrations", e))?;

        info!(count = integrations.len(), "starting all enabled links");
        for integration in &integrations {
            if let Err(e) = self.start(integration).await {
                warn!(
                    tenant_id = integration.tenant_id,
                    platform = %integration.platform,
                    error = %e,
                    "failed to start link"
                );
            }
        }
        Ok(())
    }

    /// Route an outbound message through the addressed link.
    pub async fn send(
        &self,
        tenant_id: i64,
        platform: Platform,
        external_chat_id: &str,
        content: &str,
    ) -> Result<bool> {
        let key = LinkKey {
            tenant_id,
            platform,
        };
        let link = {
            let links = self.links.read().unwrap_or_else(|e| e.into_inner());
            links.get(&key).cloned()
        }
        .ok_or(Error::LinkNotFound {
            tenant_id,
            platform,
        })?;

        Ok(link.send_message(external_chat_id, content).await)
    }

    /// Uniform outbound entry point used by the rest of the application.
    pub async fn dispatch_outbound(
        &self,
        tenant_id: i64,
        platform: Platform,
        external_chat_id: &str,
        content: &str,
    ) -> Result<bool> {
        self.send(tenant_id, platform, external_chat_id, content)
            .await
    }

    /// Keys with a live link, for status surfaces.
    #[must_use]
    pub fn active_keys(&self) -> Vec<LinkKey> {
        let links = self.links.read().unwrap_or_else(|e| e.into_inner());
        links.keys().copied().collect()
    }

    #[must_use]
    pub fn is_running(&self, key: LinkKey) -> bool {
        let links = self.links.read().unwrap_or_else(|e| e.into_inner());
        links.contains_key(&key)
    }

    /// Stop and drop the link for `key` if one exists. Stop failures are
    /// contained inside the adapters; the entry is removed regardless.
    /// Callers hold the per-key lock.
    async fn stop_and_remove(&self, key: LinkKey) {
        let old = {
            let mut links = self.links.write().unwrap_or_else(|e| e.into_inner());
            links.remove(&key)
        };
        match old {
            Some(link) => {
                link.stop().await;
                info!(tenant_id = key.tenant_id, platform = %key.platform, "link stopped");
            },
            None => {
                debug!(tenant_id = key.tenant_id, platform = %key.platform, "no link to stop");
            },
        }
    }

    fn key_lock(&self, key: LinkKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(key).or_default())
    }
}
