use {anyhow::Result, async_trait::async_trait};

use crate::types::{Integration, Platform, TokenState};

/// Tenant-scoped customer/message persistence consumed by the adapters.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Idempotent upsert keyed on `(platform, external_id, tenant_id)`.
    /// Repeated calls return the same customer id and never create
    /// duplicate rows.
    async fn ensure_customer(
        &self,
        platform: Platform,
        external_id: &str,
        display_name: &str,
        avatar: Option<&str>,
        tenant_id: i64,
    ) -> Result<i64>;

    /// Append one message. `employee_id = None` marks an inbound
    /// (customer-authored) message.
    async fn append_message(
        &self,
        content: &str,
        tenant_id: i64,
        customer_id: i64,
        employee_id: Option<i64>,
    ) -> Result<()>;
}

/// Persisted integration records, one per tenant/platform pair.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn load_enabled(&self) -> Result<Vec<Integration>>;

    async fn load(&self, tenant_id: i64, platform: Platform) -> Result<Option<Integration>>;

    /// Persist refreshed token state into the integration's credential
    /// slots. Only the token slots are touched.
    async fn persist_token_state(
        &self,
        tenant_id: i64,
        platform: Platform,
        token: &TokenState,
    ) -> Result<()>;
}
