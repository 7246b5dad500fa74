// The serenity-backed `Gateway`.
//
// Reads (capabilities, members, roles) come from serenity's cache; writes go
// through the http client. Reactions for menus are collected per message with
// a `ReactionCollector` forwarded into the core's channel. Message authors the
// guild cache has not stored fall back to the partial member on their message.

use crate::discord::embeds::reply_embed;
use crate::core::commands::{Capability, CapabilitySet};
use crate::core::gateway::{
    Gateway, GatewayError, MemberInfo, MessageHandle, ReactionEvent, ReactionSubscription, Reply,
};
use ::serenity::http::HttpError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::StreamExt;
use poise::serenity_prelude::{
    self as serenity, ChannelId, ChannelType, CreateMessage, EditMessage, GuildId, MessageId,
    PartialMember, Permissions, ReactionCollector, ReactionType, RoleId, ShardMessenger, UserId,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Buffered reactions per menu before the collector waits.
const REACTION_BUFFER: usize = 32;

const PERMISSION_MAP: [(Permissions, Capability); 30] = [
    (Permissions::ADMINISTRATOR, Capability::Administrator),
    (Permissions::VIEW_AUDIT_LOG, Capability::ViewAuditLog),
    (Permissions::MANAGE_GUILD, Capability::ManageGuild),
    (Permissions::MANAGE_ROLES, Capability::ManageRoles),
    (Permissions::MANAGE_CHANNELS, Capability::ManageChannels),
    (Permissions::KICK_MEMBERS, Capability::KickMembers),
    (Permissions::BAN_MEMBERS, Capability::BanMembers),
    (Permissions::CREATE_INSTANT_INVITE, Capability::CreateInstantInvite),
    (Permissions::CHANGE_NICKNAME, Capability::ChangeNickname),
    (Permissions::MANAGE_NICKNAMES, Capability::ManageNicknames),
    (Permissions::MANAGE_GUILD_EXPRESSIONS, Capability::ManageEmojis),
    (Permissions::MANAGE_WEBHOOKS, Capability::ManageWebhooks),
    (Permissions::VIEW_CHANNEL, Capability::ViewChannel),
    (Permissions::SEND_MESSAGES, Capability::SendMessages),
    (Permissions::SEND_TTS_MESSAGES, Capability::SendTtsMessages),
    (Permissions::MANAGE_MESSAGES, Capability::ManageMessages),
    (Permissions::EMBED_LINKS, Capability::EmbedLinks),
    (Permissions::ATTACH_FILES, Capability::AttachFiles),
    (Permissions::READ_MESSAGE_HISTORY, Capability::ReadMessageHistory),
    (Permissions::MENTION_EVERYONE, Capability::MentionEveryone),
    (Permissions::USE_EXTERNAL_EMOJIS, Capability::UseExternalEmojis),
    (Permissions::ADD_REACTIONS, Capability::AddReactions),
    (Permissions::CONNECT, Capability::Connect),
    (Permissions::SPEAK, Capability::Speak),
    (Permissions::MUTE_MEMBERS, Capability::MuteMembers),
    (Permissions::DEAFEN_MEMBERS, Capability::DeafenMembers),
    (Permissions::MOVE_MEMBERS, Capability::MoveMembers),
    (Permissions::USE_VAD, Capability::UseVad),
    (Permissions::PRIORITY_SPEAKER, Capability::PrioritySpeaker),
    (Permissions::STREAM, Capability::Stream),
];

/// Translate serenity's permission bits into core capabilities.
pub fn capabilities_from(permissions: Permissions) -> CapabilitySet {
    let mut set = CapabilitySet::new();
    for (flag, capability) in PERMISSION_MAP {
        if permissions.contains(flag) {
            set.insert(capability);
        }
    }
    set
}

/// Unicode emoji as-is, custom emoji by id.
pub fn glyph_of(emoji: &ReactionType) -> String {
    match emoji {
        ReactionType::Unicode(glyph) => glyph.clone(),
        ReactionType::Custom { id, .. } => id.get().to_string(),
        other => other.to_string(),
    }
}

pub fn to_utc(timestamp: serenity::Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), 0).unwrap_or_default()
}

pub fn member_info(member: &serenity::Member) -> MemberInfo {
    MemberInfo {
        guild_id: member.guild_id.get(),
        user_id: member.user.id.get(),
        display_name: member.display_name().to_string(),
        is_bot: member.user.bot,
        role_ids: member.roles.iter().map(|r| r.get()).collect(),
        avatar_url: Some(member.face()),
        joined_at: member.joined_at.map(to_utc),
        account_created: to_utc(member.user.created_at()),
    }
}

fn map_error(err: serenity::Error) -> GatewayError {
    let detail = err.to_string();
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &err {
        match response.status_code.as_u16() {
            404 => return GatewayError::NotFound(detail),
            403 => return GatewayError::MissingAccess(detail),
            _ => {}
        }
    }
    GatewayError::Request(detail)
}

/// Partial members seen on guild messages, keyed by (guild, user).
/// One entry per author; removed when the member leaves.
#[derive(Default)]
pub struct MessageAuthors {
    members: DashMap<(u64, u64), PartialMember>,
}

impl MessageAuthors {
    pub fn record(&self, guild_id: u64, user_id: u64, member: PartialMember) {
        self.members.insert((guild_id, user_id), member);
    }

    pub fn get(&self, guild_id: u64, user_id: u64) -> Option<PartialMember> {
        self.members.get(&(guild_id, user_id)).map(|entry| entry.clone())
    }

    pub fn forget(&self, guild_id: u64, user_id: u64) {
        self.members.remove(&(guild_id, user_id));
    }
}

pub struct SerenityGateway {
    http: Arc<serenity::Http>,
    cache: Arc<serenity::Cache>,
    shard: ShardMessenger,
    bot_id: u64,
    authors: MessageAuthors,
}

impl SerenityGateway {
    pub fn new(ctx: &serenity::Context) -> Self {
        Self {
            http: Arc::clone(&ctx.http),
            cache: Arc::clone(&ctx.cache),
            shard: ctx.shard.clone(),
            bot_id: ctx.cache.current_user().id.get(),
            authors: MessageAuthors::default(),
        }
    }

    pub fn remember_author(&self, message: &serenity::Message) {
        if let (Some(guild_id), Some(member)) = (message.guild_id, message.member.as_deref()) {
            self.authors
                .record(guild_id.get(), message.author.id.get(), member.clone());
        }
    }

    pub fn forget_author(&self, guild_id: u64, user_id: u64) {
        self.authors.forget(guild_id, user_id);
    }
}

#[async_trait]
impl Gateway for SerenityGateway {
    fn bot_user_id(&self) -> u64 {
        self.bot_id
    }

    fn bot_name(&self) -> String {
        self.cache.current_user().name.clone()
    }

    async fn send(&self, channel_id: u64, reply: Reply) -> Result<MessageHandle, GatewayError> {
        let message = ChannelId::new(channel_id)
            .send_message(&self.http, CreateMessage::new().embed(reply_embed(&reply)))
            .await
            .map_err(map_error)?;
        Ok(MessageHandle {
            channel_id,
            message_id: message.id.get(),
        })
    }

    async fn edit(&self, handle: MessageHandle, reply: Reply) -> Result<(), GatewayError> {
        ChannelId::new(handle.channel_id)
            .edit_message(
                &self.http,
                MessageId::new(handle.message_id),
                EditMessage::new().embed(reply_embed(&reply)),
            )
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn add_reaction(&self, handle: MessageHandle, glyph: &str) -> Result<(), GatewayError> {
        ChannelId::new(handle.channel_id)
            .create_reaction(
                &self.http,
                MessageId::new(handle.message_id),
                ReactionType::Unicode(glyph.to_string()),
            )
            .await
            .map_err(map_error)
    }

    async fn remove_reaction(
        &self,
        handle: MessageHandle,
        glyph: &str,
        user_id: u64,
    ) -> Result<(), GatewayError> {
        ChannelId::new(handle.channel_id)
            .delete_reaction(
                &self.http,
                MessageId::new(handle.message_id),
                Some(UserId::new(user_id)),
                ReactionType::Unicode(glyph.to_string()),
            )
            .await
            .map_err(map_error)
    }

    async fn clear_reactions(&self, handle: MessageHandle) -> Result<(), GatewayError> {
        ChannelId::new(handle.channel_id)
            .delete_reactions(&self.http, MessageId::new(handle.message_id))
            .await
            .map_err(map_error)
    }

    fn subscribe_reactions(&self, handle: MessageHandle) -> ReactionSubscription {
        let (tx, rx) = mpsc::channel(REACTION_BUFFER);
        let mut reactions = Box::pin(
            ReactionCollector::new(self.shard.clone())
                .channel_id(ChannelId::new(handle.channel_id))
                .message_id(MessageId::new(handle.message_id))
                .stream(),
        );

        let forwarder = tokio::spawn(async move {
            while let Some(reaction) = reactions.next().await {
                let Some(user_id) = reaction.user_id else {
                    continue;
                };
                let event = ReactionEvent {
                    message: handle,
                    user_id: user_id.get(),
                    glyph: glyph_of(&reaction.emoji),
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        ReactionSubscription::with_forwarder(rx, forwarder.abort_handle())
    }

    fn capabilities(&self, guild_id: u64, channel_id: u64, user_id: u64) -> CapabilitySet {
        let Some(guild) = self.cache.guild(GuildId::new(guild_id)) else {
            return CapabilitySet::new();
        };
        let Some(channel) = guild.channels.get(&ChannelId::new(channel_id)) else {
            return CapabilitySet::new();
        };
        if let Some(member) = guild.members.get(&UserId::new(user_id)) {
            return capabilities_from(guild.user_permissions_in(channel, member));
        }
        match self.authors.get(guild_id, user_id) {
            Some(partial) => capabilities_from(guild.partial_member_permissions_in(
                channel,
                UserId::new(user_id),
                &partial,
            )),
            None => CapabilitySet::new(),
        }
    }

    /// Only text and announcement channels count.
    fn channel_accessible(&self, guild_id: u64, channel_id: u64) -> bool {
        let postable = self
            .cache
            .guild(GuildId::new(guild_id))
            .and_then(|guild| {
                guild
                    .channels
                    .get(&ChannelId::new(channel_id))
                    .map(|c| matches!(c.kind, ChannelType::Text | ChannelType::News))
            })
            .unwrap_or(false);
        if !postable {
            return false;
        }

        let held = self.capabilities(guild_id, channel_id, self.bot_id);
        held.contains(Capability::Administrator)
            || [
                Capability::ViewChannel,
                Capability::SendMessages,
                Capability::EmbedLinks,
            ]
            .into_iter()
            .all(|cap| held.contains(cap))
    }

    async fn member(&self, guild_id: u64, user_id: u64) -> Result<Option<MemberInfo>, GatewayError> {
        let cached = self
            .cache
            .guild(GuildId::new(guild_id))
            .and_then(|guild| guild.members.get(&UserId::new(user_id)).map(member_info));
        if cached.is_some() {
            return Ok(cached);
        }

        match GuildId::new(guild_id)
            .member(&self.http, UserId::new(user_id))
            .await
        {
            Ok(member) => Ok(Some(member_info(&member))),
            Err(err) => match map_error(err) {
                GatewayError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    fn highest_role_position(&self, guild_id: u64, user_id: u64) -> i64 {
        let Some(guild) = self.cache.guild(GuildId::new(guild_id)) else {
            return 0;
        };
        let roles = match guild.members.get(&UserId::new(user_id)) {
            Some(member) => member.roles.clone(),
            None => match self.authors.get(guild_id, user_id) {
                Some(partial) => partial.roles,
                None => return 0,
            },
        };
        roles
            .iter()
            .filter_map(|role_id| guild.roles.get(role_id))
            .map(|role| i64::from(role.position))
            .max()
            .unwrap_or(0)
    }

    fn role_position(&self, guild_id: u64, role_id: u64) -> Option<i64> {
        let guild = self.cache.guild(GuildId::new(guild_id))?;
        let position = guild
            .roles
            .get(&RoleId::new(role_id))
            .map(|role| i64::from(role.position));
        position
    }

    fn guild_name(&self, guild_id: u64) -> Option<String> {
        self.cache
            .guild(GuildId::new(guild_id))
            .map(|guild| guild.name.clone())
    }

    async fn add_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.http
            .add_member_role(
                GuildId::new(guild_id),
                UserId::new(user_id),
                RoleId::new(role_id),
                Some(reason),
            )
            .await
            .map_err(map_error)
    }

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.http
            .remove_member_role(
                GuildId::new(guild_id),
                UserId::new(user_id),
                RoleId::new(role_id),
                Some(reason),
            )
            .await
            .map_err(map_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_bits_map_to_capabilities() {
        let caps = capabilities_from(
            Permissions::KICK_MEMBERS | Permissions::MANAGE_ROLES | Permissions::SEND_MESSAGES,
        );
        assert_eq!(caps.len(), 3);
        assert!(caps.contains(Capability::KickMembers));
        assert!(caps.contains(Capability::ManageRoles));
        assert!(!caps.contains(Capability::Administrator));

        assert!(capabilities_from(Permissions::empty()).is_empty());
    }

    #[test]
    fn every_capability_has_a_permission() {
        let all = capabilities_from(Permissions::all());
        assert_eq!(all.len(), Capability::ALL.len());
    }

    fn partial_member(roles: &[u64]) -> PartialMember {
        serde_json::from_value(serde_json::json!({
            "deaf": false,
            "mute": false,
            "joined_at": null,
            "roles": roles.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    #[test]
    fn message_authors_are_kept_until_they_leave() {
        let authors = MessageAuthors::default();
        assert!(authors.get(1, 30).is_none());

        authors.record(1, 30, partial_member(&[500]));
        authors.record(1, 30, partial_member(&[500, 600]));
        let roles = authors.get(1, 30).unwrap().roles;
        assert_eq!(roles, vec![RoleId::new(500), RoleId::new(600)]);
        assert!(authors.get(2, 30).is_none());

        authors.forget(1, 30);
        assert!(authors.get(1, 30).is_none());
    }

    #[test]
    fn glyphs_from_reactions() {
        assert_eq!(glyph_of(&ReactionType::Unicode("▶️".into())), "▶️");
    }
}
