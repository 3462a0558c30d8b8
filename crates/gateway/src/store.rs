use std::str::FromStr;

use {
    anyhow::Result,
    async_trait::async_trait,
    secrecy::ExposeSecret,
    sqlx::SqlitePool,
    tracing::warn,
};

use omnidesk_links::{
    Integration, Platform, TokenState,
    store::{CustomerStore, IntegrationStore},
};

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct IntegrationRow {
    tenant_id: i64,
    platform: String,
    enabled: bool,
    key_1: Option<String>,
    key_2: Option<String>,
    key_3: Option<String>,
    key_4: Option<String>,
    key_5: Option<String>,
    key_6: Option<String>,
}

impl TryFrom<IntegrationRow> for Integration {
    type Error = anyhow::Error;

    fn try_from(r: IntegrationRow) -> Result<Self> {
        Ok(Self {
            tenant_id: r.tenant_id,
            platform: Platform::from_str(&r.platform)?,
            enabled: r.enabled,
            key_1: r.key_1,
            key_2: r.key_2,
            key_3: r.key_3,
            key_4: r.key_4,
            key_5: r.key_5,
            key_6: r.key_6,
        })
    }
}

/// SQLite-backed integration store.
pub struct SqliteIntegrationStore {
    pool: SqlitePool,
}

impl SqliteIntegrationStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the integrations table schema.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS integrations (
                tenant_id INTEGER NOT NULL,
                platform  TEXT    NOT NULL,
                enabled   INTEGER NOT NULL DEFAULT 1,
                key_1     TEXT,
                key_2     TEXT,
                key_3     TEXT,
                key_4     TEXT,
                key_5     TEXT,
                key_6     TEXT,
                PRIMARY KEY (tenant_id, platform)
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Insert or replace one integration record.
    pub async fn upsert(&self, integration: &Integration) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO integrations
                (tenant_id, platform, enabled, key_1, key_2, key_3, key_4, key_5, key_6)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tenant_id, platform) DO UPDATE SET
                enabled = excluded.enabled,
                key_1 = excluded.key_1, key_2 = excluded.key_2, key_3 = excluded.key_3,
                key_4 = excluded.key_4, key_5 = excluded.key_5, key_6 = excluded.key_6"#,
        )
        .bind(integration.tenant_id)
        .bind(integration.platform.as_str())
        .bind(integration.enabled)
        .bind(&integration.key_1)
        .bind(&integration.key_2)
        .bind(&integration.key_3)
        .bind(&integration.key_4)
        .bind(&integration.key_5)
        .bind(&integration.key_6)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl IntegrationStore for SqliteIntegrationStore {
    /// Rows with a platform tag this build does not know are skipped with a
    /// warning rather than failing the whole load.
    async fn load_enabled(&self) -> Result<Vec<Integration>> {
        let rows = sqlx::query_as::<_, IntegrationRow>(
            "SELECT * FROM integrations WHERE enabled = 1 ORDER BY tenant_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut integrations = Vec::with_capacity(rows.len());
        for row in rows {
            let tenant_id = row.tenant_id;
            match Integration::try_from(row) {
                Ok(integration) => integrations.push(integration),
                Err(e) => warn!(tenant_id, error = %e, "skipping unloadable integration row"),
            }
        }
        Ok(integrations)
    }

    async fn load(&self, tenant_id: i64, platform: Platform) -> Result<Option<Integration>> {
        let row = sqlx::query_as::<_, IntegrationRow>(
            "SELECT * FROM integrations WHERE tenant_id = ? AND platform = ?",
        )
        .bind(tenant_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn persist_token_state(
        &self,
        tenant_id: i64,
        platform: Platform,
        token: &TokenState,
    ) -> Result<()> {
        // Only the token slots move; the static credentials stay put.
        sqlx::query(
            "UPDATE integrations SET key_4 = ?, key_5 = ?, key_6 = ?
             WHERE tenant_id = ? AND platform = ?",
        )
        .bind(token.access_token_str())
        .bind(token.refresh_token.expose_secret())
        .bind(token.expires_at.to_string())
        .bind(tenant_id)
        .bind(platform.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// SQLite-backed customer and message persistence.
pub struct SqliteCustomerStore {
    pool: SqlitePool,
}

impl SqliteCustomerStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the customers and messages table schemas.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS customers (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                platform     TEXT    NOT NULL,
                external_id  TEXT    NOT NULL,
                display_name TEXT    NOT NULL,
                avatar       TEXT,
                tenant_id    INTEGER NOT NULL,
                UNIQUE (platform, external_id, tenant_id)
            )"#,
        )
        .execute(pool)
        .await?;
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                content     TEXT    NOT NULL,
                tenant_id   INTEGER NOT NULL,
                customer_id INTEGER NOT NULL,
                employee_id INTEGER,
                created_at  INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for SqliteCustomerStore {
    async fn ensure_customer(
        &self,
        platform: Platform,
        external_id: &str,
        display_name: &str,
        avatar: Option<&str>,
        tenant_id: i64,
    ) -> Result<i64> {
        // Upsert keyed on the platform identity; repeated deliveries for
        // the same sender converge on one row and refresh its profile.
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO customers (platform, external_id, display_name, avatar, tenant_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(platform, external_id, tenant_id) DO UPDATE SET
                display_name = excluded.display_name,
                avatar = COALESCE(excluded.avatar, customers.avatar)
            RETURNING id"#,
        )
        .bind(platform.as_str())
        .bind(external_id)
        .bind(display_name)
        .bind(avatar)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn append_message(
        &self,
        content: &str,
        tenant_id: i64,
        customer_id: i64,
        employee_id: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (content, tenant_id, customer_id, employee_id, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(content)
        .bind(tenant_id)
        .bind(customer_id)
        .bind(employee_id)
        .bind(unix_now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {secrecy::Secret, super::*};

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteIntegrationStore::init(&pool).await.unwrap();
        SqliteCustomerStore::init(&pool).await.unwrap();
        pool
    }

    fn integration(tenant_id: i64, platform: Platform, enabled: bool) -> Integration {
        Integration {
            tenant_id,
            platform,
            enabled,
            key_1: Some("k1".into()),
            key_2: Some("k2".into()),
            key_3: Some("k3".into()),
            key_4: Some("access".into()),
            key_5: Some("refresh".into()),
            key_6: Some("1700000000".into()),
        }
    }

    #[tokio::test]
    async fn load_enabled_returns_only_enabled_rows() {
        let pool = pool().await;
        let store = SqliteIntegrationStore::new(pool);

        store.upsert(&integration(1, Platform::Telegram, true)).await.unwrap();
        store.upsert(&integration(1, Platform::Zalo, false)).await.unwrap();
        store.upsert(&integration(2, Platform::Zalo, true)).await.unwrap();

        let enabled = store.load_enabled().await.unwrap();
        assert_eq!(enabled.len(), 2);
        assert!(enabled.iter().all(|i| i.enabled));
    }

    #[tokio::test]
    async fn unknown_platform_rows_are_skipped_not_fatal() {
        let pool = pool().await;
        sqlx::query(
            "INSERT INTO integrations (tenant_id, platform, enabled, key_1)
             VALUES (1, 'carrier-pigeon', 1, 'k')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let store = SqliteIntegrationStore::new(pool);
        store.upsert(&integration(2, Platform::Telegram, true)).await.unwrap();

        let enabled = store.load_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].tenant_id, 2);
    }

    #[tokio::test]
    async fn persist_token_state_touches_only_the_token_slots() {
        let pool = pool().await;
        let store = SqliteIntegrationStore::new(pool);
        store.upsert(&integration(1, Platform::Zalo, true)).await.unwrap();

        let token = TokenState {
            access_token: Secret::new("new-access".into()),
            refresh_token: Secret::new("new-refresh".into()),
            expires_at: 1_800_000_000,
        };
        store
            .persist_token_state(1, Platform::Zalo, &token)
            .await
            .unwrap();

        let loaded = store.load(1, Platform::Zalo).await.unwrap().unwrap();
        assert_eq!(loaded.key_1.as_deref(), Some("k1"));
        assert_eq!(loaded.key_2.as_deref(), Some("k2"));
        assert_eq!(loaded.key_3.as_deref(), Some("k3"));
        assert_eq!(loaded.key_4.as_deref(), Some("new-access"));
        assert_eq!(loaded.key_5.as_deref(), Some("new-refresh"));
        assert_eq!(loaded.key_6.as_deref(), Some("1800000000"));
    }

    #[tokio::test]
    async fn ensure_customer_is_idempotent_per_platform_identity() {
        let pool = pool().await;
        let store = SqliteCustomerStore::new(pool.clone());

        let first = store
            .ensure_customer(Platform::Zalo, "111", "Binh", None, 9)
            .await
            .unwrap();
        let second = store
            .ensure_customer(Platform::Zalo, "111", "Binh N.", Some("http://a/p.jpg"), 9)
            .await
            .unwrap();
        assert_eq!(first, second);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        // Latest profile wins.
        let name: String = sqlx::query_scalar("SELECT display_name FROM customers WHERE id = ?")
            .bind(first)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(name, "Binh N.");
    }

    #[tokio::test]
    async fn same_external_id_in_different_tenants_is_two_customers() {
        let pool = pool().await;
        let store = SqliteCustomerStore::new(pool);

        let a = store
            .ensure_customer(Platform::Telegram, "42", "A", None, 1)
            .await
            .unwrap();
        let b = store
            .ensure_customer(Platform::Telegram, "42", "A", None, 2)
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn append_message_marks_inbound_with_null_employee() {
        let pool = pool().await;
        let store = SqliteCustomerStore::new(pool.clone());
        let customer_id = store
            .ensure_customer(Platform::Zalo, "111", "Binh", None, 9)
            .await
            .unwrap();

        store.append_message("hi", 9, customer_id, None).await.unwrap();
        store.append_message("re: hi", 9, customer_id, Some(5)).await.unwrap();

        let inbound: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE employee_id IS NULL")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(inbound, 1);
        let outbound: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE employee_id = 5")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(outbound, 1);
    }
}
