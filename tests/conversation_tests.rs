//! # Conversation Tests
//!
//! End-to-end onboarding dialogues against the in-memory store.

use anyhow::{bail, Result};
use async_trait::async_trait;
use nutrition_bot::conversation::{main_menu_labels, Conversation, Reply, ReplyKeyboard, Sender};
use nutrition_bot::db::*;
use nutrition_bot::localization::t_lang;
use nutrition_bot::profile_fields::{ActivityLevel, Choice, Gender, GoalType};
use nutrition_bot::registration::RegistrationStep;
use nutrition_bot::session_store::SessionStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use teloxide::types::ChatId;

const CHAT: ChatId = ChatId(777);

fn sender(language_code: &str) -> Sender {
    Sender {
        telegram_user_id: "777".to_string(),
        username: Some("ann".to_string()),
        first_name: Some("Ann".to_string()),
        last_name: None,
        language_code: Some(language_code.to_string()),
    }
}

fn setup() -> (Conversation, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let conversation = Conversation::new(store.clone(), SessionStore::in_memory());
    (conversation, store)
}

async fn current_step(conversation: &Conversation) -> Option<RegistrationStep> {
    conversation
        .sessions()
        .get(CHAT, "777")
        .await
        .unwrap()
        .map(|session| session.step())
}

/// Answers up to, but not including, the calorie target
fn answers_before_calories(lang: &str) -> Vec<String> {
    let lang = Some(lang);
    vec![
        "25".to_string(),
        Gender::Male.label(lang),
        "180".to_string(),
        "75.5".to_string(),
        ActivityLevel::Moderate.label(lang),
        GoalType::Lose.label(lang),
        "70".to_string(),
    ]
}

async fn say(conversation: &Conversation, user: &Sender, text: &str) -> Reply {
    conversation.handle_text(CHAT, user, text).await.unwrap()
}

#[tokio::test]
async fn test_full_registration_scenario() -> Result<()> {
    let (conversation, store) = setup();
    let user = sender("en");

    let welcome = say(&conversation, &user, "/start").await;
    assert!(welcome.text.contains("Ann"));
    assert!(welcome.text.contains(&t_lang("prompt-age", Some("en"))));
    assert_eq!(welcome.keyboard, ReplyKeyboard::Remove);
    assert_eq!(current_step(&conversation).await, Some(RegistrationStep::AwaitingAge));

    let reply = say(&conversation, &user, "25").await;
    assert_eq!(reply.text, t_lang("prompt-gender", Some("en")));
    assert_eq!(reply.keyboard, ReplyKeyboard::Choices(Gender::labels(Some("en"))));

    for answer in &answers_before_calories("en")[1..] {
        say(&conversation, &user, answer).await;
    }
    assert_eq!(
        current_step(&conversation).await,
        Some(RegistrationStep::AwaitingCalories)
    );

    let done = say(&conversation, &user, "2000").await;
    assert!(done.text.contains("2000"), "{}", done.text);
    assert!(done.text.contains("150"));
    assert!(done.text.contains("55"));
    assert!(done.text.contains("225"));
    assert_eq!(done.keyboard, ReplyKeyboard::MainMenu(main_menu_labels(Some("en"))));
    assert_eq!(current_step(&conversation).await, None);

    let profile = store.get_by_telegram_id("777").await?.unwrap();
    assert_eq!(profile.age, Some(25));
    assert_eq!(profile.gender, Some(Gender::Male));
    assert_eq!(profile.height_cm, Some(180.0));
    assert_eq!(profile.weight_kg, Some(75.5));
    assert_eq!(profile.activity_level, Some(ActivityLevel::Moderate));

    let goals = store.list_goals(profile.id).await?;
    assert_eq!(goals.len(), 1);
    let goal = &goals[0];
    assert_eq!(goal.goal_type, GoalType::Lose);
    assert_eq!(goal.target_weight_kg, 70.0);
    assert_eq!(goal.target_calories, 2000);
    assert_eq!(
        (goal.target_protein_g, goal.target_fat_g, goal.target_carbs_g),
        (150, 55, 225)
    );

    Ok(())
}

#[tokio::test]
async fn test_russian_dialogue_uses_russian_labels() -> Result<()> {
    let (conversation, store) = setup();
    let user = sender("ru");

    say(&conversation, &user, "/start").await;
    for answer in answers_before_calories("ru") {
        say(&conversation, &user, &answer).await;
    }
    let done = say(&conversation, &user, "1800").await;
    assert_eq!(done.keyboard, ReplyKeyboard::MainMenu(main_menu_labels(Some("ru"))));

    let profile = store.get_by_telegram_id("777").await?.unwrap();
    assert_eq!(profile.gender, Some(Gender::Male));
    Ok(())
}

#[tokio::test]
async fn test_invalid_answers_keep_step() -> Result<()> {
    let (conversation, _store) = setup();
    let user = sender("en");
    say(&conversation, &user, "/start").await;

    let reply = say(&conversation, &user, "abc").await;
    assert!(reply.text.starts_with(&t_lang("error-not-a-number", Some("en"))));
    assert!(reply.text.ends_with(&t_lang("prompt-age", Some("en"))));
    assert_eq!(current_step(&conversation).await, Some(RegistrationStep::AwaitingAge));

    let reply = say(&conversation, &user, "12").await;
    assert!(reply.text.contains("13-120"), "{}", reply.text);
    say(&conversation, &user, "121").await;
    assert_eq!(current_step(&conversation).await, Some(RegistrationStep::AwaitingAge));

    say(&conversation, &user, "30").await;
    // Case differs from the offered label
    let reply = say(&conversation, &user, &Gender::Male.label(Some("en")).to_uppercase()).await;
    assert!(reply.text.starts_with(&t_lang("error-unknown-choice", Some("en"))));
    assert_eq!(reply.keyboard, ReplyKeyboard::Choices(Gender::labels(Some("en"))));

    let session = conversation.sessions().get(CHAT, "777").await?.unwrap();
    assert_eq!(session.step(), RegistrationStep::AwaitingGender);
    assert_eq!(session.answers().age, Some(30));
    assert_eq!(session.answers().gender, None);
    Ok(())
}

#[tokio::test]
async fn test_start_mid_flow_restarts() -> Result<()> {
    let (conversation, store) = setup();
    let user = sender("en");

    say(&conversation, &user, "/start").await;
    say(&conversation, &user, "25").await;
    say(&conversation, &user, &Gender::Female.label(Some("en"))).await;
    assert_eq!(
        current_step(&conversation).await,
        Some(RegistrationStep::AwaitingHeight)
    );

    say(&conversation, &user, "/start").await;
    let session = conversation.sessions().get(CHAT, "777").await?.unwrap();
    assert_eq!(session.step(), RegistrationStep::AwaitingAge);
    assert_eq!(session.answers().age, None);

    // Still exactly one user record
    assert_eq!(store.list_active(10).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_menu_and_echo_outside_registration() -> Result<()> {
    let (conversation, _store) = setup();
    let user = sender("en");

    let menu = main_menu_labels(Some("en"));
    let reply = say(&conversation, &user, &menu[0]).await;
    assert_eq!(reply.text, t_lang("feature-add-meal", Some("en")));
    assert_eq!(reply.keyboard, ReplyKeyboard::Unchanged);

    let reply = say(&conversation, &user, "hello").await;
    assert!(reply.text.contains("I received: hello"), "{}", reply.text);
    assert!(reply.text.contains(&t_lang("echo-hint", Some("en"))));
    assert_eq!(current_step(&conversation).await, None);

    let reply = conversation.unsupported_message(&user);
    assert_eq!(reply.text, t_lang("unsupported-message", Some("en")));
    Ok(())
}

#[tokio::test]
async fn test_menu_label_during_registration_is_an_answer() -> Result<()> {
    let (conversation, _store) = setup();
    let user = sender("en");
    say(&conversation, &user, "/start").await;

    let reply = say(&conversation, &user, &main_menu_labels(Some("en"))[1]).await;
    assert!(reply.text.starts_with(&t_lang("error-not-a-number", Some("en"))));
    assert_eq!(current_step(&conversation).await, Some(RegistrationStep::AwaitingAge));
    Ok(())
}

#[tokio::test]
async fn test_separate_chats_do_not_share_sessions() -> Result<()> {
    let (conversation, _store) = setup();
    let ann = sender("en");
    let mut bob = sender("en");
    bob.telegram_user_id = "888".to_string();
    let bob_chat = ChatId(888);

    say(&conversation, &ann, "/start").await;
    conversation.handle_text(bob_chat, &bob, "/start").await?;
    say(&conversation, &ann, "40").await;

    assert_eq!(
        current_step(&conversation).await,
        Some(RegistrationStep::AwaitingGender)
    );
    let bob_session = conversation.sessions().get(bob_chat, "888").await?.unwrap();
    assert_eq!(bob_session.step(), RegistrationStep::AwaitingAge);
    Ok(())
}

#[tokio::test]
async fn test_group_members_register_independently() -> Result<()> {
    let (conversation, store) = setup();
    let group = ChatId(-100);
    let ann = sender("en");
    let mut bob = sender("en");
    bob.telegram_user_id = "888".to_string();
    bob.first_name = Some("Bob".to_string());

    conversation.handle_text(group, &ann, "/start").await?;

    // Bob has no registration here, so his number is just echoed
    let reply = conversation.handle_text(group, &bob, "25").await?;
    assert!(reply.text.contains("I received: 25"), "{}", reply.text);
    assert!(conversation.sessions().get(group, "888").await?.is_none());
    let ann_session = conversation.sessions().get(group, "777").await?.unwrap();
    assert_eq!(ann_session.step(), RegistrationStep::AwaitingAge);
    assert_eq!(ann_session.answers().age, None);

    conversation.handle_text(group, &bob, "/start").await?;
    for answer in answers_before_calories("en") {
        conversation.handle_text(group, &ann, &answer).await?;
    }
    conversation.handle_text(group, &bob, "40").await?;

    let done = conversation.handle_text(group, &ann, "2000").await?;
    assert!(matches!(done.keyboard, ReplyKeyboard::MainMenu(_)));
    assert!(conversation.sessions().get(group, "777").await?.is_none());

    let bob_session = conversation.sessions().get(group, "888").await?.unwrap();
    assert_eq!(bob_session.step(), RegistrationStep::AwaitingGender);
    assert_eq!(bob_session.answers().age, Some(40));

    let ann_profile = store.get_by_telegram_id("777").await?.unwrap();
    assert_eq!(ann_profile.age, Some(25));
    assert_eq!(store.list_goals(ann_profile.id).await?.len(), 1);

    let bob_profile = store.get_by_telegram_id("888").await?.unwrap();
    assert_eq!(bob_profile.age, None);
    assert!(store.list_goals(bob_profile.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_start_addressed_to_another_bot_is_ignored() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let conversation =
        Conversation::new(store, SessionStore::in_memory()).with_bot_username("NutritionBot");
    let user = sender("en");

    say(&conversation, &user, "/start@NutritionBot").await;
    say(&conversation, &user, "33").await;

    let reply = say(&conversation, &user, "/start@OtherBot").await;
    assert!(reply.text.starts_with(&t_lang("error-unknown-choice", Some("en"))));
    let session = conversation.sessions().get(CHAT, "777").await?.unwrap();
    assert_eq!(session.step(), RegistrationStep::AwaitingGender);
    assert_eq!(session.answers().age, Some(33));
    Ok(())
}

/// Store whose registration write can be switched to fail
struct FlakyStore {
    inner: InMemoryStore,
    fail_saves: AtomicBool,
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn get_by_telegram_id(&self, telegram_user_id: &str) -> Result<Option<UserProfile>> {
        self.inner.get_by_telegram_id(telegram_user_id).await
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<UserProfile>> {
        self.inner.get_by_id(id).await
    }

    async fn create(&self, user: &NewUser) -> Result<UserProfile> {
        self.inner.create(user).await
    }

    async fn get_or_create(&self, user: &NewUser) -> Result<UserProfile> {
        self.inner.get_or_create(user).await
    }

    async fn update(&self, id: i32, update: &ProfileUpdate) -> Result<Option<UserProfile>> {
        self.inner.update(id, update).await
    }

    async fn list_active(&self, limit: i64) -> Result<Vec<UserProfile>> {
        self.inner.list_active(limit).await
    }
}

#[async_trait]
impl GoalStore for FlakyStore {
    async fn create_goal(&self, user_id: i32, goal: &NewGoal) -> Result<NutritionGoal> {
        self.inner.create_goal(user_id, goal).await
    }

    async fn list_goals(&self, user_id: i32) -> Result<Vec<NutritionGoal>> {
        self.inner.list_goals(user_id).await
    }
}

#[async_trait]
impl RegistrationStore for FlakyStore {
    async fn save_registration(
        &self,
        telegram_user_id: &str,
        update: &ProfileUpdate,
        goal: &NewGoal,
    ) -> Result<Option<(UserProfile, NutritionGoal)>> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("connection reset");
        }
        self.inner
            .save_registration(telegram_user_id, update, goal)
            .await
    }
}

#[tokio::test]
async fn test_failed_save_keeps_calorie_step() -> Result<()> {
    let store = Arc::new(FlakyStore {
        inner: InMemoryStore::new(),
        fail_saves: AtomicBool::new(true),
    });
    let conversation = Conversation::new(store.clone(), SessionStore::in_memory());
    let user = sender("en");

    say(&conversation, &user, "/start").await;
    for answer in answers_before_calories("en") {
        say(&conversation, &user, &answer).await;
    }

    let reply = say(&conversation, &user, "2000").await;
    assert!(reply.text.starts_with(&t_lang("error-save-failed", Some("en"))));
    assert!(reply.text.ends_with(&t_lang("prompt-calories", Some("en"))));
    assert_eq!(
        current_step(&conversation).await,
        Some(RegistrationStep::AwaitingCalories)
    );
    let profile = store.get_by_telegram_id("777").await?.unwrap();
    assert_eq!(profile.age, None);
    assert!(store.list_goals(profile.id).await?.is_empty());

    // Resending after recovery completes the registration
    store.fail_saves.store(false, Ordering::SeqCst);
    let done = say(&conversation, &user, "2000").await;
    assert!(matches!(done.keyboard, ReplyKeyboard::MainMenu(_)));
    assert_eq!(current_step(&conversation).await, None);
    assert_eq!(store.list_goals(profile.id).await?.len(), 1);
    Ok(())
}
