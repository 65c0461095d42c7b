//! Registration sessions keyed by user within a chat, on top of teloxide's
//! dialogue storage.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use teloxide::dispatching::dialogue::{ErasedStorage, InMemStorage, Storage};
use teloxide::types::ChatId;

use crate::registration::RegistrationSession;

/// Sessions of every user registering in one chat, keyed by Telegram user id
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSessions {
    users: HashMap<String, RegistrationSession>,
}

/// Storage backend holding registration sessions
pub type SessionStorage = ErasedStorage<ChatSessions>;

/// Ephemeral per-conversation registration state.
///
/// A conversation is one user in one chat, so members of a group register
/// independently. Teloxide storages are keyed by chat; the entry for a chat
/// holds the sessions of its users. The dispatcher handles one chat's updates
/// sequentially, which keeps the read-modify-write below free of lost updates.
///
/// Expiry and durability belong to the wrapped storage: the default
/// in-memory storage keeps sessions until the process exits, while any other
/// teloxide storage can be passed to [`SessionStore::new`].
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<SessionStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<SessionStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(InMemStorage::<ChatSessions>::new().erase())
    }

    async fn load(&self, chat_id: ChatId) -> Result<Option<ChatSessions>> {
        Arc::clone(&self.storage)
            .get_dialogue(chat_id)
            .await
            .map_err(|e| anyhow!(e).context("Failed to load registration sessions"))
    }

    async fn store(&self, chat_id: ChatId, sessions: ChatSessions) -> Result<()> {
        if sessions.users.is_empty() {
            // InMemStorage reports removing a missing entry as an error.
            if self.load(chat_id).await?.is_none() {
                return Ok(());
            }
            return Arc::clone(&self.storage)
                .remove_dialogue(chat_id)
                .await
                .map_err(|e| anyhow!(e).context("Failed to clear registration sessions"));
        }

        Arc::clone(&self.storage)
            .update_dialogue(chat_id, sessions)
            .await
            .map_err(|e| anyhow!(e).context("Failed to store registration session"))
    }

    pub async fn get(&self, chat_id: ChatId, user_id: &str) -> Result<Option<RegistrationSession>> {
        Ok(self
            .load(chat_id)
            .await?
            .and_then(|mut sessions| sessions.users.remove(user_id)))
    }

    pub async fn set(&self, chat_id: ChatId, user_id: &str, session: RegistrationSession) -> Result<()> {
        let mut sessions = self.load(chat_id).await?.unwrap_or_default();
        sessions.users.insert(user_id.to_string(), session);
        self.store(chat_id, sessions).await
    }

    /// Remove a user's session; a missing session is not an error
    pub async fn clear(&self, chat_id: ChatId, user_id: &str) -> Result<()> {
        let Some(mut sessions) = self.load(chat_id).await? else {
            return Ok(());
        };
        if sessions.users.remove(user_id).is_none() {
            return Ok(());
        }
        self.store(chat_id, sessions).await
    }
}
