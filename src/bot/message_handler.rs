//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::User;
use tracing::{debug, warn};

use crate::conversation::{Conversation, Sender};

use super::ui_builder::send_reply;

/// Identity of a Telegram user as the conversation layer sees it
pub fn sender_from_user(user: &User) -> Sender {
    Sender {
        telegram_user_id: user.id.0.to_string(),
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
        language_code: user.language_code.clone(),
    }
}

async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    sender: &Sender,
    text: &str,
    conversation: &Conversation,
) -> Result<()> {
    debug!(user_id = %sender.telegram_user_id, chat_id = %msg.chat.id, "Received text message");
    let reply = conversation.handle_text(msg.chat.id, sender, text).await?;
    send_reply(bot, msg.chat.id, reply).await
}

async fn handle_unsupported_message(
    bot: &Bot,
    msg: &Message,
    sender: &Sender,
    conversation: &Conversation,
) -> Result<()> {
    debug!(user_id = %sender.telegram_user_id, "Received non-text message");
    send_reply(bot, msg.chat.id, conversation.unsupported_message(sender)).await
}

pub async fn message_handler(bot: Bot, msg: Message, conversation: Conversation) -> Result<()> {
    // Channel posts and service messages carry no user to register.
    let Some(user) = msg.from.as_ref() else {
        warn!(chat_id = %msg.chat.id, "Ignoring message without sender");
        return Ok(());
    };
    let sender = sender_from_user(user);

    if let Some(text) = msg.text() {
        handle_text_message(&bot, &msg, &sender, text, &conversation).await?;
    } else {
        handle_unsupported_message(&bot, &msg, &sender, &conversation).await?;
    }

    Ok(())
}
