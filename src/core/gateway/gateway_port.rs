// The gateway port - everything the core needs from the chat platform.
//
// The core never touches serenity types. The discord layer implements
// `Gateway` on top of serenity's http client, cache and collectors, and the
// tests implement it with a recording mock.
//
// Ids are plain u64s, the same way the rest of the core passes them around.

use crate::core::commands::capabilities::{Capability, CapabilitySet};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Request(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing access: {0}")]
    MissingAccess(String),
}

// ============================================================================
// HANDLES AND INBOUND DATA
// ============================================================================

/// A message the bot posted (or can otherwise address).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel_id: u64,
    pub message_id: u64,
}

/// A message delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: u64,
    /// `None` for direct messages.
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_name: String,
    pub author_is_bot: bool,
    pub avatar_url: Option<String>,
    pub content: String,
    pub attachments: Vec<String>,
}

impl InboundMessage {
    pub fn handle(&self) -> MessageHandle {
        MessageHandle {
            channel_id: self.channel_id,
            message_id: self.message_id,
        }
    }
}

/// A reaction added to (or removed from) a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub message: MessageHandle,
    pub user_id: u64,
    /// The unicode emoji, or the id of a custom emoji.
    pub glyph: String,
}

/// What the core needs to know about a guild member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub guild_id: u64,
    pub user_id: u64,
    pub display_name: String,
    pub is_bot: bool,
    pub role_ids: Vec<u64>,
    pub avatar_url: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
    pub account_created: DateTime<Utc>,
}

impl MemberInfo {
    pub fn has_role(&self, role_id: u64) -> bool {
        self.role_ids.contains(&role_id)
    }

    pub fn mention(&self) -> String {
        user_mention(self.user_id)
    }
}

pub fn user_mention(user_id: u64) -> String {
    format!("<@{}>", user_id)
}

pub fn channel_mention(channel_id: u64) -> String {
    format!("<#{}>", channel_id)
}

pub fn role_mention(role_id: u64) -> String {
    format!("<@&{}>", role_id)
}

/// Typed inbound events. The event router consumes these; the discord layer
/// produces them from `serenity::FullEvent`.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    MessageCreated(InboundMessage),
    MessageEdited {
        guild_id: Option<u64>,
        channel_id: u64,
        message_id: u64,
        /// `None` when the edit didn't touch the content (embeds resolving etc).
        new_content: Option<String>,
    },
    MessageDeleted {
        guild_id: Option<u64>,
        channel_id: u64,
        message_id: u64,
    },
    ReactionAdded(ReactionEvent),
    ReactionRemoved(ReactionEvent),
    MemberJoined(MemberInfo),
    MemberLeft {
        guild_id: u64,
        user_id: u64,
        user_name: String,
        avatar_url: Option<String>,
        joined_at: Option<DateTime<Utc>>,
    },
    MemberUpdated {
        guild_id: u64,
        user_id: u64,
        old_nickname: Option<String>,
        new_nickname: Option<String>,
    },
    GuildJoined {
        guild_id: u64,
        name: String,
        system_channel_id: Option<u64>,
    },
    GuildLeft {
        guild_id: u64,
    },
}

// ============================================================================
// REPLIES
// ============================================================================

/// Colour family of a reply card. The adapter picks the actual colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    Neutral,
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyAuthor {
    pub name: String,
    pub icon_url: Option<String>,
}

/// A render-neutral reply card.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reply {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<ReplyField>,
    pub footer: Option<String>,
    pub author: Option<ReplyAuthor>,
    pub tone: Tone,
}

impl Reply {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(ReplyField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn author(mut self, name: impl Into<String>, icon_url: Option<String>) -> Self {
        self.author = Some(ReplyAuthor {
            name: name.into(),
            icon_url,
        });
        self
    }

    pub fn tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    /// Title with a suffix appended, used by menus to show the visible range.
    pub fn with_title_suffix(mut self, suffix: &str) -> Self {
        if let Some(title) = self.title.as_mut() {
            title.push_str(suffix);
        }
        self
    }

    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// Field values are capped at 1024 characters.
pub const MAX_FIELD_LEN: usize = 1024;

/// Clip text to fit a reply field, marking the cut with `...`.
pub fn truncate_field(text: &str) -> String {
    if text.chars().count() <= MAX_FIELD_LEN {
        return text.to_string();
    }
    let kept: String = text.chars().take(MAX_FIELD_LEN - 3).collect();
    format!("{}...", kept)
}

// ============================================================================
// REACTION SUBSCRIPTIONS
// ============================================================================

/// Reaction events for exactly one message.
///
/// Dropping the subscription releases whatever the gateway set up to feed
/// it (for serenity, the collector forwarding task).
pub struct ReactionSubscription {
    events: mpsc::Receiver<ReactionEvent>,
    forwarder: Option<AbortHandle>,
}

impl ReactionSubscription {
    pub fn new(events: mpsc::Receiver<ReactionEvent>) -> Self {
        Self {
            events,
            forwarder: None,
        }
    }

    pub fn with_forwarder(events: mpsc::Receiver<ReactionEvent>, forwarder: AbortHandle) -> Self {
        Self {
            events,
            forwarder: Some(forwarder),
        }
    }

    /// Next reaction, or `None` once the gateway side has gone away.
    pub async fn recv(&mut self) -> Option<ReactionEvent> {
        self.events.recv().await
    }
}

impl Drop for ReactionSubscription {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

// ============================================================================
// THE PORT
// ============================================================================

#[async_trait]
pub trait Gateway: Send + Sync {
    fn bot_user_id(&self) -> u64;

    fn bot_name(&self) -> String;

    async fn send(&self, channel_id: u64, reply: Reply) -> Result<MessageHandle, GatewayError>;

    async fn edit(&self, handle: MessageHandle, reply: Reply) -> Result<(), GatewayError>;

    async fn add_reaction(&self, handle: MessageHandle, glyph: &str) -> Result<(), GatewayError>;

    async fn remove_reaction(
        &self,
        handle: MessageHandle,
        glyph: &str,
        user_id: u64,
    ) -> Result<(), GatewayError>;

    async fn clear_reactions(&self, handle: MessageHandle) -> Result<(), GatewayError>;

    /// Start listening for reactions added to `handle`.
    fn subscribe_reactions(&self, handle: MessageHandle) -> ReactionSubscription;

    /// Capabilities `user_id` holds in `channel_id`, from the platform cache.
    /// Empty when the guild, channel or member isn't cached.
    fn capabilities(&self, guild_id: u64, channel_id: u64, user_id: u64) -> CapabilitySet;

    fn has_capabilities(
        &self,
        guild_id: u64,
        channel_id: u64,
        user_id: u64,
        required: &CapabilitySet,
    ) -> bool {
        let held = self.capabilities(guild_id, channel_id, user_id);
        held.contains(Capability::Administrator) || required.is_subset(&held)
    }

    /// Whether the bot can view, send and embed in the channel.
    fn channel_accessible(&self, guild_id: u64, channel_id: u64) -> bool {
        let held = self.capabilities(guild_id, channel_id, self.bot_user_id());
        [
            Capability::ViewChannel,
            Capability::SendMessages,
            Capability::EmbedLinks,
        ]
        .into_iter()
        .all(|cap| held.contains(cap) || held.contains(Capability::Administrator))
    }

    async fn member(&self, guild_id: u64, user_id: u64) -> Result<Option<MemberInfo>, GatewayError>;

    /// Position of the member's highest role, 0 when they only have @everyone.
    fn highest_role_position(&self, guild_id: u64, user_id: u64) -> i64;

    fn role_position(&self, guild_id: u64, role_id: u64) -> Option<i64>;

    /// Name of a guild the bot is in, from the platform cache.
    fn guild_name(&self, guild_id: u64) -> Option<String>;

    async fn add_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<(), GatewayError>;

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<(), GatewayError>;
}

#[cfg(test)]
#[path = "mock_gateway.rs"]
pub mod mock;
