// Discord layer - the serenity adapter and the built-in commands.
//
// Commands are parsed and dispatched by the core; poise only runs the
// client and hands every event to `event_handler`.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "gateway/serenity_gateway.rs"]
pub mod gateway;

#[path = "gateway/embed_formatter.rs"]
pub mod embeds;

#[path = "events/event_bridge.rs"]
pub mod events;

use crate::core::events::EventRouter;
use crate::discord::gateway::SerenityGateway;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// State shared with the event handler.
pub struct Data {
    pub router: Arc<EventRouter>,
    pub gateway: Arc<SerenityGateway>,
}

pub type Error = anyhow::Error;

/// Forward every event the core understands to the router. Failures are
/// logged here so one bad event never takes the client down.
pub async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => data.gateway.remember_author(new_message),
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            data.gateway.forget_author(guild_id.get(), user.id.get())
        }
        _ => {}
    }

    let Some(event) = events::to_gateway_event(event) else {
        return Ok(());
    };

    if let Err(e) = data.router.handle(event).await {
        tracing::error!("Error handling gateway event: {:#}", e);
    }
    Ok(())
}
