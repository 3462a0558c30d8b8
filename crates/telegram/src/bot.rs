use std::sync::Arc;

use {
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use omnidesk_links::store::CustomerStore;

use crate::{config::TelegramCredentials, inbound, link::TelegramLink};

/// Start the link for a single tenant's bot.
///
/// Verifies the token, clears any leftover webhook so long polling works,
/// then spawns a background task that processes updates until the link's
/// `stop()` is called. Construction fails (and nothing is spawned) when the
/// token is rejected by the platform.
pub async fn start_link(
    tenant_id: i64,
    credentials: TelegramCredentials,
    customers: Arc<dyn CustomerStore>,
) -> anyhow::Result<TelegramLink> {
    // Client timeout must exceed the long-polling timeout (30s) so the HTTP
    // client doesn't abort the request before Telegram responds.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(std::time::Duration::from_secs(45))
        .build()?;
    let token = credentials.token_str().to_string();
    let bot = Bot::with_client(&token, client);

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;

    info!(
        tenant_id,
        username = ?me.username,
        "telegram bot connected (webhook cleared)"
    );

    let cancel = CancellationToken::new();
    let poll_task = spawn_poll_loop(
        tenant_id,
        bot.clone(),
        token,
        cancel.clone(),
        Arc::clone(&customers),
    );

    Ok(TelegramLink {
        bot,
        tenant_id,
        cancel,
        poll_task: tokio::sync::Mutex::new(Some(poll_task)),
    })
}

fn spawn_poll_loop(
    tenant_id: i64,
    bot: Bot,
    token: String,
    cancel: CancellationToken,
    customers: Arc<dyn CustomerStore>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(tenant_id, "starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!(tenant_id, "telegram polling stopped");
                break;
            }

            let result = tokio::select! {
                () = cancel.cancelled() => {
                    info!(tenant_id, "telegram polling stopped");
                    break;
                },
                result = bot
                    .get_updates()
                    .offset(offset)
                    .timeout(30)
                    .allowed_updates(vec![AllowedUpdate::Message])
                    .send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(tenant_id, count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        // stop() between batches must cut delivery immediately.
                        if cancel.is_cancelled() {
                            break;
                        }
                        match update.kind {
                            UpdateKind::Message(msg) => {
                                if let Err(e) = inbound::handle_update(
                                    &bot, &token, tenant_id, &customers, &msg,
                                )
                                .await
                                {
                                    error!(
                                        tenant_id,
                                        error = %e,
                                        "error handling telegram message"
                                    );
                                }
                            },
                            other => {
                                debug!(tenant_id, "ignoring non-message update: {other:?}");
                            },
                        }
                    }
                },
                Err(e) => {
                    // Another bot instance is consuming the same token; keeping
                    // this loop alive would double-consume the update offset.
                    if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                        error!(
                            tenant_id,
                            "telegram polling halted: another instance is running with this token"
                        );
                        cancel.cancel();
                        break;
                    }

                    warn!(tenant_id, error = %e, "telegram getUpdates failed");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                },
            }
        }
    })
}
