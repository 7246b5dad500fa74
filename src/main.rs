// This is the entry point of the moderation bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core storage traits (SQLite, in-memory)
// - `discord/` = The serenity adapter and the built-in commands
//
// This file's job is to:
// 1. Load settings
// 2. Initialize services (dependency injection)
// 3. Set up the Discord client and route its events into the core

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;
mod settings;

use crate::core::commands::{CommandRegistry, OwnerSet};
use crate::core::config::ConfigService;
use crate::core::events::EventRouter;
use crate::core::services::BotServices;
use crate::discord::commands::builtin_commands;
use crate::discord::gateway::SerenityGateway;
use crate::discord::{Data, Error};
use crate::infra::sqlite::SqliteGuildStore;
use crate::settings::BotSettings;
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let settings = BotSettings::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let store = Arc::new(
        SqliteGuildStore::open(&settings.database_path)
            .await
            .context("Failed to open the guild database")?,
    );

    let config = Arc::new(ConfigService::new(store.clone(), settings.default_prefix.clone()));
    let warmed = config
        .warm()
        .await
        .context("Failed to load guild settings")?;
    tracing::info!(guilds = warmed, "Guild settings loaded");

    let mut registry = CommandRegistry::new();
    let loaded = registry.load(builtin_commands());
    tracing::info!(commands = loaded, "Commands registered");

    let services = Arc::new(BotServices::new(
        OwnerSet::new(settings.owner_ids.iter().copied()),
        registry,
        config,
        store.clone(),
        store,
    ));

    // ========================================================================
    // DISCORD CLIENT SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read prefixed commands
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS;

    let framework = poise::Framework::<Data, Error>::builder()
        .options(poise::FrameworkOptions {
            event_handler: |ctx, event, framework, data| {
                Box::pin(discord::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                tracing::info!(user = %ready.user.name, guilds = ready.guilds.len(), "Bot is ready");

                let gateway = Arc::new(SerenityGateway::new(ctx));
                let router = Arc::new(EventRouter::new(services, gateway.clone()));
                Ok(Data { router, gateway })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&settings.token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
