//! # Nutrition Telegram Bot
//!
//! Backend of a Telegram nutrition assistant: onboards users through a
//! registration dialogue, stores their biometric profile and derives daily
//! calorie and macronutrient targets.

pub mod bot;
pub mod config;
pub mod conversation;
pub mod db;
pub mod localization;
pub mod nutrition;
pub mod profile_fields;
pub mod registration;
pub mod server;
pub mod session_store;
