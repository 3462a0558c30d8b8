use std::sync::Arc;

use {
    teloxide::{
        payloads::GetUserProfilePhotosSetters,
        prelude::*,
        types::{Message, User, UserId},
    },
    tracing::{debug, info},
};

use omnidesk_links::{Platform, store::CustomerStore};

/// Recorded in place of content types that carry no textual body (stickers,
/// media without captions, locations) so the conversation still shows that
/// the customer wrote something.
pub const UNSUPPORTED_CONTENT_PLACEHOLDER: &str = "[unsupported message]";

/// Normalize one inbound message and write it through to the customer store.
pub(crate) async fn handle_update(
    bot: &Bot,
    token: &str,
    tenant_id: i64,
    customers: &Arc<dyn CustomerStore>,
    msg: &Message,
) -> anyhow::Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(
            tenant_id,
            chat_id = msg.chat.id.0,
            "dropping message without resolvable sender identity"
        );
        return Ok(());
    };

    let text = message_body(msg);
    let name = display_name(user);
    // Missing avatar is not an error.
    let avatar = fetch_avatar(bot, token, user.id).await;

    record_inbound(
        customers,
        tenant_id,
        &user.id.to_string(),
        &name,
        avatar.as_deref(),
        &text,
    )
    .await
}

/// Idempotent customer upsert followed by the message append. Split out so
/// the write-through path is testable without a live bot.
pub(crate) async fn record_inbound(
    customers: &Arc<dyn CustomerStore>,
    tenant_id: i64,
    external_id: &str,
    display_name: &str,
    avatar: Option<&str>,
    text: &str,
) -> anyhow::Result<()> {
    let customer_id = customers
        .ensure_customer(Platform::Telegram, external_id, display_name, avatar, tenant_id)
        .await?;
    customers
        .append_message(text, tenant_id, customer_id, None)
        .await?;
    info!(tenant_id, customer_id, "recorded inbound telegram message");
    Ok(())
}

/// Text body of the message, or the fixed placeholder for content types
/// without one.
pub(crate) fn message_body(msg: &Message) -> String {
    msg.text()
        .or_else(|| msg.caption())
        .map(ToString::to_string)
        .unwrap_or_else(|| UNSUPPORTED_CONTENT_PLACEHOLDER.to_string())
}

pub(crate) fn display_name(user: &User) -> String {
    let last = user.last_name.as_deref().unwrap_or("");
    let name = format!("{} {last}", user.first_name).trim().to_string();
    if name.is_empty() {
        user.username.clone().unwrap_or_else(|| user.id.to_string())
    } else {
        name
    }
}

/// Best-effort avatar URL for the sender's most recent profile photo.
async fn fetch_avatar(bot: &Bot, token: &str, user_id: UserId) -> Option<String> {
    let photos = match bot.get_user_profile_photos(user_id).limit(1).await {
        Ok(photos) => photos,
        Err(e) => {
            debug!(user_id = user_id.0, error = %e, "profile photo fetch failed");
            return None;
        },
    };
    let photo = photos.photos.first()?.last()?;
    let file = match bot.get_file(photo.file.id.clone()).await {
        Ok(file) => file,
        Err(e) => {
            debug!(user_id = user_id.0, error = %e, "profile photo file lookup failed");
            return None;
        },
    };
    Some(format!(
        "https://api.telegram.org/file/bot{token}/{}",
        file.path
    ))
}
