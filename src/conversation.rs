//! Conversation controller: routes inbound text to the registration
//! dialogue, persists finished registrations and builds the replies.
//!
//! Replies are transport-neutral; `bot::message_handler` turns them into
//! Telegram messages and keyboards.

use anyhow::Result;
use std::sync::Arc;
use teloxide::types::ChatId;
use tracing::{debug, error, info, warn};

use crate::db::{NewUser, NutritionGoal, RegistrationStore};
use crate::localization::{t_args_lang, t_lang};
use crate::profile_fields::FieldError;
use crate::registration::{RegistrationSession, RegistrationStep, Transition};
use crate::session_store::SessionStore;

const START_COMMAND: &str = "/start";

/// Main menu buttons and the stub reply each one gets
const MENU_ITEMS: &[(&str, &str)] = &[
    ("menu-add-meal", "feature-add-meal"),
    ("menu-history", "feature-history"),
    ("menu-recommendations", "feature-recommendations"),
    ("menu-profile", "feature-profile"),
];

/// Keyboard to show alongside a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKeyboard {
    /// Leave whatever keyboard the user currently sees
    Unchanged,
    /// Hide the custom keyboard
    Remove,
    /// One-time keyboard with one button per option
    Choices(Vec<String>),
    /// Persistent main menu
    MainMenu(Vec<String>),
}

/// Outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: ReplyKeyboard,
}

impl Reply {
    fn new(text: String, keyboard: ReplyKeyboard) -> Self {
        Self { text, keyboard }
    }

    fn text(text: String) -> Self {
        Self::new(text, ReplyKeyboard::Unchanged)
    }
}

/// The Telegram user behind an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub telegram_user_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
}

impl Sender {
    fn to_new_user(&self) -> NewUser {
        NewUser {
            telegram_user_id: self.telegram_user_id.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Labels of the main menu buttons
pub fn main_menu_labels(language_code: Option<&str>) -> Vec<String> {
    MENU_ITEMS
        .iter()
        .map(|(label_key, _)| t_lang(label_key, language_code))
        .collect()
}

/// `/start`, or `/start@<bot>` when addressed to this bot by username
fn is_start_command(text: &str, bot_username: Option<&str>) -> bool {
    let Some(command) = text.split_whitespace().next() else {
        return false;
    };
    match command.split_once('@') {
        None => command == START_COMMAND,
        Some((command, addressee)) => {
            command == START_COMMAND
                && bot_username.is_some_and(|own| own.eq_ignore_ascii_case(addressee))
        }
    }
}

/// Question for a step together with its keyboard
fn prompt(step: RegistrationStep, language_code: Option<&str>) -> Reply {
    let keyboard = match step.choices(language_code) {
        Some(labels) => ReplyKeyboard::Choices(labels),
        None => ReplyKeyboard::Remove,
    };
    Reply::new(t_lang(step.prompt_key(), language_code), keyboard)
}

fn describe_error(step: RegistrationStep, error: &FieldError, language_code: Option<&str>) -> String {
    match error {
        FieldError::NotANumber => t_lang("error-not-a-number", language_code),
        FieldError::UnknownChoice => t_lang("error-unknown-choice", language_code),
        FieldError::OutOfRange { min, max } => t_args_lang(
            step.range_error_key(),
            &[("min", &min.to_string()), ("max", &max.to_string())],
            language_code,
        ),
        FieldError::NotAwaitingInput | FieldError::MissingAnswer(_) => {
            t_lang("error-unknown-choice", language_code)
        }
    }
}

fn completion_summary(goal: &NutritionGoal, language_code: Option<&str>) -> String {
    let macros = goal.macros();
    format!(
        "{}\n\n{}\n{}\n{}\n\n{}",
        t_lang("complete-title", language_code),
        t_lang("complete-targets", language_code),
        t_args_lang(
            "complete-calories",
            &[("calories", &goal.target_calories.to_string())],
            language_code
        ),
        t_args_lang(
            "complete-macros",
            &[
                ("protein", &macros.protein_g.to_string()),
                ("fat", &macros.fat_g.to_string()),
                ("carbs", &macros.carbs_g.to_string()),
            ],
            language_code
        ),
        t_lang("complete-ready", language_code),
    )
}

/// Routes text messages through the onboarding flow.
///
/// Every user has their own registration in every chat they write in.
#[derive(Clone)]
pub struct Conversation {
    store: Arc<dyn RegistrationStore>,
    sessions: SessionStore,
    bot_username: Option<String>,
}

impl Conversation {
    pub fn new(store: Arc<dyn RegistrationStore>, sessions: SessionStore) -> Self {
        Self {
            store,
            sessions,
            bot_username: None,
        }
    }

    /// Also accept `/start@<username>` as the start command
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    pub fn store(&self) -> &Arc<dyn RegistrationStore> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Register the user if needed and (re)start the registration dialogue
    pub async fn start(&self, chat_id: ChatId, sender: &Sender) -> Result<Reply> {
        let language_code = sender.language_code.as_deref();
        info!(user_id = %sender.telegram_user_id, "Start command received");

        let user = self.store.get_or_create(&sender.to_new_user()).await?;
        debug!(user_id = user.id, "User registered or found");

        self.sessions
            .set(
                chat_id,
                &sender.telegram_user_id,
                RegistrationSession::new(sender.language_code.clone()),
            )
            .await?;

        let name = sender
            .first_name
            .clone()
            .unwrap_or_else(|| t_lang("default-name", language_code));
        let greeting = format!(
            "{}\n\n{}\n\n{} {}",
            t_args_lang("welcome-greeting", &[("name", &name)], language_code),
            t_lang("welcome-intro", language_code),
            t_lang("welcome-start-profile", language_code),
            t_lang(RegistrationStep::AwaitingAge.prompt_key(), language_code),
        );

        Ok(Reply::new(greeting, ReplyKeyboard::Remove))
    }

    /// Handle one inbound text message.
    ///
    /// Order: `/start`, then an active registration, then the main menu
    /// buttons, then the echo fallback.
    pub async fn handle_text(&self, chat_id: ChatId, sender: &Sender, text: &str) -> Result<Reply> {
        if is_start_command(text, self.bot_username.as_deref()) {
            return self.start(chat_id, sender).await;
        }

        if let Some(session) = self.sessions.get(chat_id, &sender.telegram_user_id).await? {
            return self.continue_registration(chat_id, sender, session, text).await;
        }

        let language_code = sender.language_code.as_deref();
        if let Some(reply) = menu_reply(text, language_code) {
            return Ok(reply);
        }

        debug!(user_id = %sender.telegram_user_id, "Unmatched text, echoing back");
        Ok(Reply::text(format!(
            "{}\n\n{}",
            t_args_lang("echo-received", &[("text", text)], language_code),
            t_lang("echo-hint", language_code)
        )))
    }

    /// Reply for messages without text
    pub fn unsupported_message(&self, sender: &Sender) -> Reply {
        Reply::text(t_lang("unsupported-message", sender.language_code.as_deref()))
    }

    async fn continue_registration(
        &self,
        chat_id: ChatId,
        sender: &Sender,
        session: RegistrationSession,
        text: &str,
    ) -> Result<Reply> {
        // Prompts stay in the language the dialogue started in.
        let language_code = session
            .language_code()
            .or(sender.language_code.as_deref())
            .map(str::to_string);
        let language_code = language_code.as_deref();
        let step = session.step();

        let mut next = session.clone();
        match next.submit(text) {
            Ok(Transition::Next { step: next_step, .. }) => {
                debug!(user_id = %sender.telegram_user_id, ?next_step, "Registration step accepted");
                self.sessions
                    .set(chat_id, &sender.telegram_user_id, next)
                    .await?;
                Ok(prompt(next_step, language_code))
            }
            Ok(Transition::Complete(registration)) => {
                let update = registration.profile_update();
                let goal = registration.goal();

                match self
                    .store
                    .save_registration(&sender.telegram_user_id, &update, &goal)
                    .await
                {
                    Ok(Some((profile, goal))) => {
                        self.sessions
                            .clear(chat_id, &sender.telegram_user_id)
                            .await?;
                        info!(user_id = profile.id, goal_id = goal.id, "Registration completed");
                        Ok(Reply::new(
                            completion_summary(&goal, language_code),
                            ReplyKeyboard::MainMenu(main_menu_labels(language_code)),
                        ))
                    }
                    Ok(None) => {
                        // The profile row vanished mid-dialogue; start over.
                        warn!(user_id = %sender.telegram_user_id, "User missing at registration completion");
                        self.start(chat_id, sender).await
                    }
                    Err(e) => {
                        // Session stays at the calorie question so the answer can be resent.
                        error!(user_id = %sender.telegram_user_id, error = %e, "Failed to save registration");
                        Ok(Reply::new(
                            format!(
                                "{}\n\n{}",
                                t_lang("error-save-failed", language_code),
                                t_lang(step.prompt_key(), language_code)
                            ),
                            ReplyKeyboard::Remove,
                        ))
                    }
                }
            }
            Err(FieldError::NotAwaitingInput | FieldError::MissingAnswer(_)) => {
                warn!(user_id = %sender.telegram_user_id, ?step, "Inconsistent registration session, restarting");
                self.start(chat_id, sender).await
            }
            Err(e) => {
                debug!(user_id = %sender.telegram_user_id, ?step, error = %e, "Registration answer rejected");
                let question = prompt(step, language_code);
                Ok(Reply::new(
                    format!("{}\n\n{}", describe_error(step, &e, language_code), question.text),
                    question.keyboard,
                ))
            }
        }
    }
}

fn menu_reply(text: &str, language_code: Option<&str>) -> Option<Reply> {
    MENU_ITEMS
        .iter()
        .find(|(label_key, _)| t_lang(label_key, language_code) == text)
        .map(|(_, reply_key)| Reply::text(t_lang(reply_key, language_code)))
}
