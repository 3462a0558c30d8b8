use async_trait::async_trait;

use crate::types::Platform;

/// One live connection adapter for a tenant/platform pair.
///
/// Implementations own whatever protocol state their platform needs (poll
/// loop handle, webhook correlation entry, cached token) and log their own
/// transmission errors. The registry only ever exposes currently-mapped,
/// non-stopped instances.
#[async_trait]
pub trait Link: Send + Sync {
    /// Platform this link is connected to.
    fn platform(&self) -> Platform;

    /// Transmit `content` to the platform-side chat `external_chat_id`.
    ///
    /// Returns `true` only on platform-acknowledged success; any
    /// transmission error is logged and reported as `false` so the
    /// dispatcher sees a plain boolean outcome.
    async fn send_message(&self, external_chat_id: &str, content: &str) -> bool;

    /// Halt inbound delivery. Idempotent: calling it twice, or on an
    /// already-stopped link, is a no-op.
    async fn stop(&self);
}
