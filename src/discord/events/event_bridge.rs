// Translates serenity's `FullEvent` into the core's `GatewayEvent`.
//
// Events the core has no use for map to `None`.

use crate::core::gateway::{GatewayEvent, InboundMessage, MessageHandle, ReactionEvent};
use crate::discord::gateway::{glyph_of, member_info, to_utc};
use poise::serenity_prelude::{self as serenity, FullEvent};

pub fn to_gateway_event(event: &FullEvent) -> Option<GatewayEvent> {
    let translated = match event {
        FullEvent::Message { new_message } => {
            GatewayEvent::MessageCreated(inbound_message(new_message))
        }
        FullEvent::MessageUpdate { event, .. } => GatewayEvent::MessageEdited {
            guild_id: event.guild_id.map(|id| id.get()),
            channel_id: event.channel_id.get(),
            message_id: event.id.get(),
            new_content: event.content.clone(),
        },
        FullEvent::MessageDelete {
            channel_id,
            deleted_message_id,
            guild_id,
        } => GatewayEvent::MessageDeleted {
            guild_id: guild_id.map(|id| id.get()),
            channel_id: channel_id.get(),
            message_id: deleted_message_id.get(),
        },
        FullEvent::ReactionAdd { add_reaction } => {
            GatewayEvent::ReactionAdded(reaction_event(add_reaction)?)
        }
        FullEvent::ReactionRemove { removed_reaction } => {
            GatewayEvent::ReactionRemoved(reaction_event(removed_reaction)?)
        }
        FullEvent::GuildMemberAddition { new_member } => {
            GatewayEvent::MemberJoined(member_info(new_member))
        }
        FullEvent::GuildMemberRemoval {
            guild_id,
            user,
            member_data_if_available,
        } => GatewayEvent::MemberLeft {
            guild_id: guild_id.get(),
            user_id: user.id.get(),
            user_name: user.name.clone(),
            avatar_url: Some(user.face()),
            joined_at: member_data_if_available
                .as_ref()
                .and_then(|member| member.joined_at)
                .map(to_utc),
        },
        // Without the previous state there is nothing to compare against
        FullEvent::GuildMemberUpdate {
            old_if_available: Some(old),
            event,
            ..
        } => GatewayEvent::MemberUpdated {
            guild_id: event.guild_id.get(),
            user_id: event.user.id.get(),
            old_nickname: old.nick.clone(),
            new_nickname: event.nick.clone(),
        },
        FullEvent::GuildCreate { guild, .. } => GatewayEvent::GuildJoined {
            guild_id: guild.id.get(),
            name: guild.name.clone(),
            system_channel_id: guild.system_channel_id.map(|id| id.get()),
        },
        // An outage, not a removal
        FullEvent::GuildDelete { incomplete, .. } if incomplete.unavailable => return None,
        FullEvent::GuildDelete { incomplete, .. } => GatewayEvent::GuildLeft {
            guild_id: incomplete.id.get(),
        },
        _ => return None,
    };
    Some(translated)
}

fn inbound_message(message: &serenity::Message) -> InboundMessage {
    let author_name = message
        .member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .or_else(|| message.author.global_name.clone())
        .unwrap_or_else(|| message.author.name.clone());

    InboundMessage {
        message_id: message.id.get(),
        guild_id: message.guild_id.map(|id| id.get()),
        channel_id: message.channel_id.get(),
        author_id: message.author.id.get(),
        author_name,
        author_is_bot: message.author.bot,
        avatar_url: Some(message.author.face()),
        content: message.content.clone(),
        attachments: message
            .attachments
            .iter()
            .map(|a| a.filename.clone())
            .collect(),
    }
}

/// Reactions without a user (uncached partials) are dropped.
fn reaction_event(reaction: &serenity::Reaction) -> Option<ReactionEvent> {
    Some(ReactionEvent {
        message: MessageHandle {
            channel_id: reaction.channel_id.get(),
            message_id: reaction.message_id.get(),
        },
        user_id: reaction.user_id?.get(),
        glyph: glyph_of(&reaction.emoji),
    })
}
