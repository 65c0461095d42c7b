use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use nutrition_bot::bot;
use nutrition_bot::config::Settings;
use nutrition_bot::conversation::Conversation;
use nutrition_bot::db::{init_database_schema, InMemoryStore, PgStore, RegistrationStore};
use nutrition_bot::localization::init_localization;
use nutrition_bot::server::{health_routes, WEBHOOK_PATH};
use nutrition_bot::session_store::SessionStore;

fn init_tracing(settings: &Settings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(settings.log_filter()));

    if settings.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

async fn connect_store(settings: &Settings) -> Result<(Arc<dyn RegistrationStore>, Option<PgPool>)> {
    let Some(database_url) = settings.database_url.as_deref() else {
        info!("DATABASE_URL not set, using in-memory store");
        return Ok((Arc::new(InMemoryStore::new()), None));
    };

    info!("Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    init_database_schema(&pool).await?;

    Ok((Arc::new(PgStore::new(pool.clone())), Some(pool)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;
    init_tracing(&settings);

    info!(version = nutrition_bot::server::VERSION, "Starting Nutrition Bot backend");

    init_localization()?;

    let (store, pool) = connect_store(&settings).await?;
    let bot = Bot::new(settings.telegram_bot_token.clone());

    let mut conversation = Conversation::new(store, SessionStore::in_memory());
    match bot.get_me().await {
        Ok(me) => match me.user.username {
            Some(username) => {
                info!(%username, "Bot identity resolved");
                conversation = conversation.with_bot_username(username);
            }
            None => warn!("Bot has no username, only bare /start is recognised"),
        },
        Err(e) => warn!(error = %e, "Failed to fetch bot identity, only bare /start is recognised"),
    }

    let addr = settings.server_addr()?;

    let handler = Update::filter_message().endpoint(bot::message_handler);

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![conversation])
        .enable_ctrlc_handler()
        .build();

    match settings.webhook_url.clone() {
        Some(mut url) => {
            url.set_path(WEBHOOK_PATH);
            info!(%url, %addr, "Starting in webhook mode");

            let (listener, stop_flag, webhook_router) =
                webhooks::axum_to_router(bot, webhooks::Options::new(addr, url))
                    .await
                    .context("Failed to set up webhook")?;
            let app = webhook_router.merge(health_routes());

            let tcp_listener = tokio::net::TcpListener::bind(addr)
                .await
                .context("Failed to bind HTTP server")?;
            tokio::spawn(async move {
                if let Err(e) = axum::serve(tcp_listener, app)
                    .with_graceful_shutdown(stop_flag)
                    .await
                {
                    error!(error = %e, "HTTP server failed");
                }
            });

            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
                )
                .await;
        }
        None => {
            info!(%addr, "Starting in polling mode");

            let tcp_listener = tokio::net::TcpListener::bind(addr)
                .await
                .context("Failed to bind HTTP server")?;
            tokio::spawn(async move {
                if let Err(e) = axum::serve(tcp_listener, health_routes()).await {
                    error!(error = %e, "HTTP server failed");
                }
            });

            dispatcher.dispatch().await;
        }
    }

    if let Some(pool) = pool {
        pool.close().await;
    }
    info!("Bot stopped");

    Ok(())
}
