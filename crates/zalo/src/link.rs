use std::sync::Arc;

use {
    async_trait::async_trait,
    tracing::info,
};

use omnidesk_links::{Link, Platform};

use crate::service::ZaloService;

/// Live Zalo connection for one tenant. Inbound delivery is passive (the
/// shared webhook listener), so the link's only protocol state is its
/// correlation entry.
pub struct ZaloLink {
    pub(crate) service: Arc<ZaloService>,
    pub(crate) tenant_id: i64,
    pub(crate) app_id: String,
}

#[async_trait]
impl Link for ZaloLink {
    fn platform(&self) -> Platform {
        Platform::Zalo
    }

    async fn send_message(&self, external_chat_id: &str, content: &str) -> bool {
        self.service
            .send_message(self.tenant_id, external_chat_id, content)
            .await
    }

    async fn stop(&self) {
        // Removing the correlation entry stops the shared listener from
        // accepting this tenant's events. Absent entry means an earlier
        // stop already ran; nothing to do.
        if self.service.webhooks().remove(&self.app_id) {
            info!(
                tenant_id = self.tenant_id,
                app_id = %self.app_id,
                "stopping zalo link"
            );
        }
    }
}
