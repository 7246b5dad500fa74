use super::logging_models::{LogChannelKind, LogEvent, TrackedMessage};
use crate::core::config::ConfigService;
use crate::core::gateway::{channel_mention, truncate_field, user_mention, Gateway, Reply, Tone};
use dashmap::DashMap;
use std::sync::Arc;

// Cap how many messages we keep in memory for logging so we don't grow unbounded.
const MAX_TRACKED_MESSAGES: usize = 5_000;

/// Publishes member and message activity to the guild's log channels.
pub struct ActivityLogPublisher {
    config: Arc<ConfigService>,
    // Message ID -> Snapshot for logging edits/deletes even if the platform cache evicts them
    message_cache: DashMap<u64, TrackedMessage>,
}

impl ActivityLogPublisher {
    pub fn new(config: Arc<ConfigService>) -> Self {
        Self {
            config,
            message_cache: DashMap::new(),
        }
    }

    /// Store a message snapshot so we can later log deletes/edits reliably.
    pub fn remember_message(&self, message: TrackedMessage) {
        self.message_cache.insert(message.message_id, message);

        // Simple eviction: drop an arbitrary entry once we cross the cap.
        if self.message_cache.len() > MAX_TRACKED_MESSAGES {
            if let Some(first_key) = self.message_cache.iter().next().map(|entry| *entry.key()) {
                self.message_cache.remove(&first_key);
            }
        }
    }

    /// Get a tracked message without removing it.
    pub fn get_tracked_message(&self, message_id: u64) -> Option<TrackedMessage> {
        self.message_cache.get(&message_id).map(|m| m.clone())
    }

    /// Remove a tracked message (used for deletions).
    pub fn take_tracked_message(&self, message_id: u64) -> Option<TrackedMessage> {
        self.message_cache.remove(&message_id).map(|(_, msg)| msg)
    }

    pub fn tracked_len(&self) -> usize {
        self.message_cache.len()
    }

    /// Record an edit against the snapshot. Returns the edit event when the
    /// message is tracked and its content actually changed.
    pub fn record_edit(&self, message_id: u64, new_content: &str) -> Option<LogEvent> {
        let mut tracked = self.message_cache.get_mut(&message_id)?;
        if tracked.content == new_content {
            return None;
        }

        let before_content = std::mem::replace(&mut tracked.content, new_content.to_string());
        Some(LogEvent::MessageEdited {
            guild_id: tracked.guild_id,
            author_id: tracked.author_id,
            author_name: tracked.author_name.clone(),
            channel_id: tracked.channel_id,
            before_content,
            after_content: new_content.to_string(),
            avatar_url: tracked.avatar_url.clone(),
        })
    }

    /// Turn a deletion into a log event, if we saw the message.
    pub fn record_delete(&self, guild_id: u64, message_id: u64) -> Option<LogEvent> {
        let snapshot = self.take_tracked_message(message_id)?;
        if snapshot.guild_id != guild_id {
            return None;
        }

        Some(LogEvent::MessageDeleted {
            guild_id,
            author_id: snapshot.author_id,
            author_name: snapshot.author_name,
            channel_id: snapshot.channel_id,
            content: snapshot.content,
            attachments: snapshot.attachments,
            avatar_url: snapshot.avatar_url,
        })
    }

    fn channel_for(&self, guild_id: u64, kind: LogChannelKind) -> Option<u64> {
        let config = self.config.get(guild_id)?;
        match kind {
            LogChannelKind::Member => config.member_log_channel_id,
            LogChannelKind::MessageEdit => config.message_edit_log_channel_id,
            LogChannelKind::MessageDelete => config.message_delete_log_channel_id,
        }
    }

    /// Send the event to its log channel. Returns whether a message went out.
    pub async fn publish(&self, gateway: &dyn Gateway, event: &LogEvent) -> bool {
        let guild_id = event.guild_id();
        let channel_id = match self.channel_for(guild_id, event.channel_kind()) {
            Some(id) => id,
            None => return false,
        };

        if !gateway.channel_accessible(guild_id, channel_id) {
            tracing::debug!(guild_id, channel_id, event = event.name(), "Log channel not accessible");
            return false;
        }

        match gateway.send(channel_id, log_reply(event)).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(guild_id, channel_id, event = event.name(), "Failed to send log: {}", e);
                false
            }
        }
    }
}

fn content_or_placeholder(content: &str) -> String {
    if content.is_empty() {
        "*No content*".to_string()
    } else {
        truncate_field(content)
    }
}

pub fn log_reply(event: &LogEvent) -> Reply {
    match event {
        LogEvent::MemberJoined {
            guild_id,
            user_id,
            user_name,
            avatar_url,
            created_at,
        } => Reply::new("Member Joined")
            .description(format!("{} has joined the server.", user_mention(*user_id)))
            .author(user_name.clone(), avatar_url.clone())
            .field("Account Created", format!("<t:{}:R>", created_at.timestamp()), false)
            .footer(format!("Guild ID: {}", guild_id))
            .tone(Tone::Success),

        LogEvent::MemberLeft {
            guild_id,
            user_id,
            user_name,
            avatar_url,
            joined_at,
        } => {
            let joined_str = match joined_at {
                Some(joined) => format!("<t:{}:R>", joined.timestamp()),
                None => "Unknown".to_string(),
            };

            Reply::new("Member Left")
                .description(format!("{} has left the server.", user_mention(*user_id)))
                .author(user_name.clone(), avatar_url.clone())
                .field("Joined Server", joined_str, false)
                .footer(format!("Guild ID: {}", guild_id))
                .tone(Tone::Error)
        }

        LogEvent::NicknameChanged {
            guild_id,
            user_id,
            old_nickname,
            new_nickname,
        } => {
            let show = |nick: &Option<String>| match nick {
                Some(nick) => format!("`{}`", nick),
                None => "`None`".to_string(),
            };

            Reply::new("Member Update: `Nickname`")
                .description(format!("{}'s **nickname** was changed.", user_mention(*user_id)))
                .field("Nickname", format!("{} ➔ {}", show(old_nickname), show(new_nickname)), false)
                .footer(format!("Guild ID: {}", guild_id))
                .tone(Tone::Info)
        }

        LogEvent::MessageDeleted {
            guild_id,
            author_id,
            author_name,
            channel_id,
            content,
            attachments,
            avatar_url,
        } => {
            let mut reply = Reply::new("Message Update: `Delete`")
                .description(format!(
                    "{}'s **message** in {} was deleted.",
                    user_mention(*author_id),
                    channel_mention(*channel_id)
                ))
                .author(author_name.clone(), avatar_url.clone())
                .field("Message", content_or_placeholder(content), false)
                .footer(format!("Guild ID: {}", guild_id))
                .tone(Tone::Warning);

            if !attachments.is_empty() {
                reply = reply.field("Attachments", truncate_field(&attachments.join("\n")), false);
            }
            reply
        }

        LogEvent::MessageEdited {
            guild_id,
            author_id,
            author_name,
            channel_id,
            before_content,
            after_content,
            avatar_url,
        } => Reply::new("Message Update: `Edit`")
            .description(format!(
                "{} edited a message in {}.",
                user_mention(*author_id),
                channel_mention(*channel_id)
            ))
            .author(author_name.clone(), avatar_url.clone())
            .field("Before", content_or_placeholder(before_content), false)
            .field("After", content_or_placeholder(after_content), false)
            .footer(format!("Guild ID: {}", guild_id))
            .tone(Tone::Info),
    }
}
