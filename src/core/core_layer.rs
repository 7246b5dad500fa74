// The core module contains all business logic.
// Each feature gets its own submodule. Nothing in here knows about serenity;
// the platform is reached through the `gateway` port.

#[path = "gateway/gateway_port.rs"]
pub mod gateway;

#[path = "commands/mod.rs"]
pub mod commands;

#[path = "config/mod.rs"]
pub mod config;

#[path = "store/mod.rs"]
pub mod store;

#[path = "pagination/reaction_menu.rs"]
pub mod pagination;

#[path = "scheduler/mod.rs"]
pub mod scheduler;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "logging/mod.rs"]
pub mod logging;

#[path = "services/bot_services.rs"]
pub mod services;

#[path = "events/event_router.rs"]
pub mod events;
