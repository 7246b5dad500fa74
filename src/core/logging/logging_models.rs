use chrono::{DateTime, Utc};

/// Activity worth logging to one of a guild's log channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    MemberJoined {
        guild_id: u64,
        user_id: u64,
        user_name: String,
        avatar_url: Option<String>,
        created_at: DateTime<Utc>,
    },
    MemberLeft {
        guild_id: u64,
        user_id: u64,
        user_name: String,
        avatar_url: Option<String>,
        joined_at: Option<DateTime<Utc>>,
    },
    NicknameChanged {
        guild_id: u64,
        user_id: u64,
        old_nickname: Option<String>,
        new_nickname: Option<String>,
    },
    MessageDeleted {
        guild_id: u64,
        author_id: u64,
        author_name: String,
        channel_id: u64,
        content: String,
        attachments: Vec<String>,
        avatar_url: Option<String>,
    },
    MessageEdited {
        guild_id: u64,
        author_id: u64,
        author_name: String,
        channel_id: u64,
        before_content: String,
        after_content: String,
        avatar_url: Option<String>,
    },
}

/// Which configured channel an event goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChannelKind {
    Member,
    MessageEdit,
    MessageDelete,
}

impl LogEvent {
    pub fn guild_id(&self) -> u64 {
        match self {
            LogEvent::MemberJoined { guild_id, .. }
            | LogEvent::MemberLeft { guild_id, .. }
            | LogEvent::NicknameChanged { guild_id, .. }
            | LogEvent::MessageDeleted { guild_id, .. }
            | LogEvent::MessageEdited { guild_id, .. } => *guild_id,
        }
    }

    pub fn channel_kind(&self) -> LogChannelKind {
        match self {
            LogEvent::MemberJoined { .. }
            | LogEvent::MemberLeft { .. }
            | LogEvent::NicknameChanged { .. } => LogChannelKind::Member,
            LogEvent::MessageEdited { .. } => LogChannelKind::MessageEdit,
            LogEvent::MessageDeleted { .. } => LogChannelKind::MessageDelete,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LogEvent::MemberJoined { .. } => "member_joined",
            LogEvent::MemberLeft { .. } => "member_left",
            LogEvent::NicknameChanged { .. } => "nickname_changed",
            LogEvent::MessageDeleted { .. } => "message_deleted",
            LogEvent::MessageEdited { .. } => "message_edited",
        }
    }
}

/// Minimal snapshot of a message that we keep in-memory so
/// deletions/edits can be logged even if the platform cache
/// has already evicted the original message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedMessage {
    pub message_id: u64,
    pub guild_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_name: String,
    pub content: String,
    pub attachments: Vec<String>,
    pub avatar_url: Option<String>,
}
