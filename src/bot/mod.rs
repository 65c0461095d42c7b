//! Bot module for handling Telegram interactions
//!
//! - `message_handler`: turns incoming messages into conversation events
//! - `ui_builder`: renders replies as messages with reply keyboards

pub mod message_handler;
pub mod ui_builder;

pub use message_handler::{message_handler, sender_from_user};
pub use ui_builder::{create_choice_keyboard, create_main_menu_keyboard, send_reply};
