//! UI Builder module for turning replies into Telegram keyboards

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup};

use crate::conversation::{Reply, ReplyKeyboard};

/// One button per row, in the order given
fn keyboard_rows(labels: &[String]) -> Vec<Vec<KeyboardButton>> {
    labels
        .iter()
        .map(|label| vec![KeyboardButton::new(label.clone())])
        .collect()
}

/// Keyboard offering the options of a choice question; hidden after one tap
pub fn create_choice_keyboard(labels: &[String]) -> KeyboardMarkup {
    KeyboardMarkup::new(keyboard_rows(labels))
        .resize_keyboard()
        .one_time_keyboard()
}

/// Persistent main menu shown after registration
pub fn create_main_menu_keyboard(labels: &[String]) -> KeyboardMarkup {
    KeyboardMarkup::new(keyboard_rows(labels))
        .resize_keyboard()
        .persistent()
}

pub fn reply_markup(keyboard: &ReplyKeyboard) -> Option<ReplyMarkup> {
    match keyboard {
        ReplyKeyboard::Unchanged => None,
        ReplyKeyboard::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
        ReplyKeyboard::Choices(labels) => Some(ReplyMarkup::Keyboard(create_choice_keyboard(labels))),
        ReplyKeyboard::MainMenu(labels) => {
            Some(ReplyMarkup::Keyboard(create_main_menu_keyboard(labels)))
        }
    }
}

/// Send a reply to a chat with its keyboard attached
pub async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<()> {
    let request = bot.send_message(chat_id, reply.text);
    match reply_markup(&reply.keyboard) {
        Some(markup) => request.reply_markup(markup).await?,
        None => request.await?,
    };
    Ok(())
}
