use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::State,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{get, post},
    },
    secrecy::ExposeSecret,
    tracing::{info, warn},
};

use omnidesk_zalo::webhook::{WebhookEnvelope, verify_signature};

use crate::state::AppState;

/// Header carrying the webhook signature, in the platform's `mac=<hex>`
/// form.
const SIGNATURE_HEADER: &str = "x-zevent-signature";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook/zalo", post(zalo_webhook_handler))
        .with_state(state)
}

pub async fn serve(addr: &str, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "links": state.registry.active_keys().len(),
    }))
}

/// Shared delivery endpoint for every tenant's Zalo events.
///
/// The request is rejected with 401 before anything touches the store
/// unless the payload parses, the app id maps to a live link, and the
/// signature proves authenticity under that tenant's webhook secret.
/// Failures past authentication are logged and acknowledged so the
/// platform does not retry a payload we cannot process.
async fn zalo_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        warn!("zalo webhook rejected: missing signature header");
        return StatusCode::UNAUTHORIZED;
    };
    let signature = signature.strip_prefix("mac=").unwrap_or(signature);

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "zalo webhook rejected: unparseable payload");
            return StatusCode::UNAUTHORIZED;
        },
    };

    let Some(route) = state.zalo.webhooks().lookup(&envelope.app_id) else {
        warn!(app_id = %envelope.app_id, "zalo webhook rejected: no live link for app id");
        return StatusCode::UNAUTHORIZED;
    };

    if !verify_signature(
        &envelope.app_id,
        &body,
        &envelope.timestamp,
        route.secret.expose_secret(),
        signature,
    ) {
        warn!(
            app_id = %envelope.app_id,
            tenant_id = route.tenant_id,
            "zalo webhook rejected: signature mismatch"
        );
        return StatusCode::UNAUTHORIZED;
    }

    if let Err(e) = state.zalo.handle_event(route.tenant_id, &envelope).await {
        warn!(
            tenant_id = route.tenant_id,
            event = %envelope.event_name,
            error = %e,
            "zalo webhook event processing failed"
        );
    }
    StatusCode::OK
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use {
        axum::{body::Body, http::Request},
        hmac::{Hmac, Mac},
        http_body_util::BodyExt,
        secrecy::Secret,
        sha2::Sha256,
        sqlx::SqlitePool,
        tower::ServiceExt,
    };

    use {
        omnidesk_links::{
            Integration, Platform,
            store::{CustomerStore, IntegrationStore},
        },
        omnidesk_registry::{LinkRegistry, PlatformLinkFactory},
        omnidesk_zalo::ZaloService,
    };

    use {
        super::*,
        crate::store::{SqliteCustomerStore, SqliteIntegrationStore},
    };

    struct Harness {
        app: Router,
        pool: SqlitePool,
    }

    async fn harness(api_base: &str) -> Harness {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteIntegrationStore::init(&pool).await.unwrap();
        SqliteCustomerStore::init(&pool).await.unwrap();

        let integrations: Arc<dyn IntegrationStore> =
            Arc::new(SqliteIntegrationStore::new(pool.clone()));
        let customers: Arc<dyn CustomerStore> = Arc::new(SqliteCustomerStore::new(pool.clone()));

        let zalo = Arc::new(ZaloService::with_bases(
            Arc::clone(&integrations),
            Arc::clone(&customers),
            api_base,
            api_base,
        ));
        let factory = Arc::new(PlatformLinkFactory::new(customers, Arc::clone(&zalo)));
        let registry = Arc::new(LinkRegistry::new(integrations, factory));

        zalo.webhooks()
            .register("app-1", 9, Secret::new("hook-secret".into()));

        let app = build_router(AppState { registry, zalo });
        Harness { app, pool }
    }

    async fn seed_integration(pool: &SqlitePool) {
        let expires = unix_now() + 90_000;
        let store = SqliteIntegrationStore::new(pool.clone());
        store
            .upsert(&Integration {
                tenant_id: 9,
                platform: Platform::Zalo,
                enabled: true,
                key_1: Some("app-1".into()),
                key_2: Some("app-secret".into()),
                key_3: Some("hook-secret".into()),
                key_4: Some("cached-access".into()),
                key_5: Some("cached-refresh".into()),
                key_6: Some(expires.to_string()),
            })
            .await
            .unwrap();
    }

    fn unix_now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn sign(app_id: &str, body: &[u8], timestamp: &str, secret: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(app_id.as_bytes());
        mac.update(body);
        mac.update(timestamp.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook/zalo")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn customer_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let server = mockito::Server::new_async().await;
        let h = harness(&server.url()).await;

        let resp = h
            .app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn missing_signature_header_is_unauthorized() {
        let server = mockito::Server::new_async().await;
        let h = harness(&server.url()).await;

        let body = r#"{"app_id":"app-1","event_name":"user_send_text","timestamp":"T"}"#;
        let resp = h.app.oneshot(webhook_request(body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(customer_count(&h.pool).await, 0);
    }

    #[tokio::test]
    async fn unparseable_payload_is_unauthorized() {
        let server = mockito::Server::new_async().await;
        let h = harness(&server.url()).await;

        let resp = h
            .app
            .oneshot(webhook_request("not json", Some("mac=00")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_app_id_is_unauthorized() {
        let server = mockito::Server::new_async().await;
        let h = harness(&server.url()).await;

        let body = r#"{"app_id":"other-app","event_name":"user_send_text","timestamp":"T"}"#;
        let signature = sign("other-app", body.as_bytes(), "T", "hook-secret");
        let resp = h
            .app
            .oneshot(webhook_request(body, Some(&signature)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forged_signature_is_rejected_before_any_store_write() {
        let server = mockito::Server::new_async().await;
        let h = harness(&server.url()).await;
        seed_integration(&h.pool).await;

        let body = r#"{"app_id":"app-1","event_name":"user_send_text","timestamp":"T",
            "sender":{"id":"111"},"message":{"text":"hi"}}"#;
        let forged = sign("app-1", body.as_bytes(), "T", "wrong-secret");
        let resp = h
            .app
            .oneshot(webhook_request(body, Some(&format!("mac={forged}"))))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(customer_count(&h.pool).await, 0);
    }

    #[tokio::test]
    async fn signed_event_lands_as_inbound_message_and_redelivery_is_idempotent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2.0/oa/getprofile")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error":0,"data":{"display_name":"Binh","avatar":""}}"#)
            .create_async()
            .await;

        let h = harness(&server.url()).await;
        seed_integration(&h.pool).await;

        let body = r#"{"app_id":"app-1","event_name":"user_send_text","timestamp":"1712000000","sender":{"id":"111"},"message":{"text":"hi"}}"#;
        let signature = sign("app-1", body.as_bytes(), "1712000000", "hook-secret");

        for _ in 0..2 {
            let resp = h
                .app
                .clone()
                .oneshot(webhook_request(body, Some(&format!("mac={signature}"))))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        // One customer despite redelivery; both messages inbound.
        assert_eq!(customer_count(&h.pool).await, 1);
        let inbound: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE employee_id IS NULL")
                .fetch_one(&h.pool)
                .await
                .unwrap();
        assert_eq!(inbound, 2);
    }
}
