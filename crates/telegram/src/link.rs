use {
    async_trait::async_trait,
    teloxide::{prelude::*, types::ChatId},
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use omnidesk_links::{Link, Platform};

/// Live Telegram connection for one tenant. Dropping the link does not stop
/// the poll loop; the registry calls `stop()` explicitly.
pub struct TelegramLink {
    pub(crate) bot: Bot,
    pub(crate) tenant_id: i64,
    pub(crate) cancel: CancellationToken,
    pub(crate) poll_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Link for TelegramLink {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn send_message(&self, external_chat_id: &str, content: &str) -> bool {
        let chat_id = match external_chat_id.parse::<i64>() {
            Ok(id) => ChatId(id),
            Err(e) => {
                warn!(
                    tenant_id = self.tenant_id,
                    chat_id = external_chat_id,
                    error = %e,
                    "telegram chat id is not numeric"
                );
                return false;
            },
        };

        match self.bot.send_message(chat_id, content).await {
            Ok(_) => {
                info!(
                    tenant_id = self.tenant_id,
                    chat_id = external_chat_id,
                    "telegram outbound message sent"
                );
                true
            },
            Err(e) => {
                warn!(
                    tenant_id = self.tenant_id,
                    chat_id = external_chat_id,
                    error = %e,
                    "telegram outbound send failed"
                );
                false
            },
        }
    }

    /// Cancel the poll loop and wait for the task to finish, so no update
    /// still in flight can reach the store after this returns. The handle
    /// is taken on the first call; later calls find nothing to join.
    async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.poll_task.lock().await.take();
        if let Some(handle) = handle {
            info!(tenant_id = self.tenant_id, "stopping telegram link");
            if let Err(e) = handle.await {
                warn!(
                    tenant_id = self.tenant_id,
                    error = %e,
                    "telegram poll task ended abnormally"
                );
            }
        }
    }
}
