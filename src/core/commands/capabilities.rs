// Capabilities are the platform permission flags a command can require.
//
// The set is closed: definitions name capabilities with the platform's
// SCREAMING_SNAKE_CASE tokens and unknown tokens are rejected when the
// command is registered, not when somebody first tries to run it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A single platform permission flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    Administrator,
    ViewAuditLog,
    ManageGuild,
    ManageRoles,
    ManageChannels,
    KickMembers,
    BanMembers,
    CreateInstantInvite,
    ChangeNickname,
    ManageNicknames,
    ManageEmojis,
    ManageWebhooks,
    ViewChannel,
    SendMessages,
    SendTtsMessages,
    ManageMessages,
    EmbedLinks,
    AttachFiles,
    ReadMessageHistory,
    MentionEveryone,
    UseExternalEmojis,
    AddReactions,
    Connect,
    Speak,
    MuteMembers,
    DeafenMembers,
    MoveMembers,
    UseVad,
    PrioritySpeaker,
    Stream,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Capability; 30] = [
        Capability::Administrator,
        Capability::ViewAuditLog,
        Capability::ManageGuild,
        Capability::ManageRoles,
        Capability::ManageChannels,
        Capability::KickMembers,
        Capability::BanMembers,
        Capability::CreateInstantInvite,
        Capability::ChangeNickname,
        Capability::ManageNicknames,
        Capability::ManageEmojis,
        Capability::ManageWebhooks,
        Capability::ViewChannel,
        Capability::SendMessages,
        Capability::SendTtsMessages,
        Capability::ManageMessages,
        Capability::EmbedLinks,
        Capability::AttachFiles,
        Capability::ReadMessageHistory,
        Capability::MentionEveryone,
        Capability::UseExternalEmojis,
        Capability::AddReactions,
        Capability::Connect,
        Capability::Speak,
        Capability::MuteMembers,
        Capability::DeafenMembers,
        Capability::MoveMembers,
        Capability::UseVad,
        Capability::PrioritySpeaker,
        Capability::Stream,
    ];

    /// The token used in command definitions.
    pub fn token(&self) -> &'static str {
        match self {
            Capability::Administrator => "ADMINISTRATOR",
            Capability::ViewAuditLog => "VIEW_AUDIT_LOG",
            Capability::ManageGuild => "MANAGE_GUILD",
            Capability::ManageRoles => "MANAGE_ROLES",
            Capability::ManageChannels => "MANAGE_CHANNELS",
            Capability::KickMembers => "KICK_MEMBERS",
            Capability::BanMembers => "BAN_MEMBERS",
            Capability::CreateInstantInvite => "CREATE_INSTANT_INVITE",
            Capability::ChangeNickname => "CHANGE_NICKNAME",
            Capability::ManageNicknames => "MANAGE_NICKNAMES",
            Capability::ManageEmojis => "MANAGE_EMOJIS",
            Capability::ManageWebhooks => "MANAGE_WEBHOOKS",
            Capability::ViewChannel => "VIEW_CHANNEL",
            Capability::SendMessages => "SEND_MESSAGES",
            Capability::SendTtsMessages => "SEND_TTS_MESSAGES",
            Capability::ManageMessages => "MANAGE_MESSAGES",
            Capability::EmbedLinks => "EMBED_LINKS",
            Capability::AttachFiles => "ATTACH_FILES",
            Capability::ReadMessageHistory => "READ_MESSAGE_HISTORY",
            Capability::MentionEveryone => "MENTION_EVERYONE",
            Capability::UseExternalEmojis => "USE_EXTERNAL_EMOJIS",
            Capability::AddReactions => "ADD_REACTIONS",
            Capability::Connect => "CONNECT",
            Capability::Speak => "SPEAK",
            Capability::MuteMembers => "MUTE_MEMBERS",
            Capability::DeafenMembers => "DEAFEN_MEMBERS",
            Capability::MoveMembers => "MOVE_MEMBERS",
            Capability::UseVad => "USE_VAD",
            Capability::PrioritySpeaker => "PRIORITY_SPEAKER",
            Capability::Stream => "STREAM",
        }
    }

    /// Human readable label, used when listing missing capabilities.
    pub fn label(&self) -> &'static str {
        match self {
            Capability::Administrator => "Administrator",
            Capability::ViewAuditLog => "View Audit Log",
            Capability::ManageGuild => "Manage Server",
            Capability::ManageRoles => "Manage Roles",
            Capability::ManageChannels => "Manage Channels",
            Capability::KickMembers => "Kick Members",
            Capability::BanMembers => "Ban Members",
            Capability::CreateInstantInvite => "Create Invite",
            Capability::ChangeNickname => "Change Nickname",
            Capability::ManageNicknames => "Manage Nicknames",
            Capability::ManageEmojis => "Manage Emojis",
            Capability::ManageWebhooks => "Manage Webhooks",
            Capability::ViewChannel => "Read Text Channels & See Voice Channels",
            Capability::SendMessages => "Send Messages",
            Capability::SendTtsMessages => "Send TTS Messages",
            Capability::ManageMessages => "Manage Messages",
            Capability::EmbedLinks => "Embed Links",
            Capability::AttachFiles => "Attach Files",
            Capability::ReadMessageHistory => "Read Message History",
            Capability::MentionEveryone => "Mention @everyone, @here, and All Roles",
            Capability::UseExternalEmojis => "Use External Emojis",
            Capability::AddReactions => "Add Reactions",
            Capability::Connect => "Connect",
            Capability::Speak => "Speak",
            Capability::MuteMembers => "Mute Members",
            Capability::DeafenMembers => "Deafen Members",
            Capability::MoveMembers => "Move Members",
            Capability::UseVad => "Use Voice Activity",
            Capability::PrioritySpeaker => "Priority Speaker",
            Capability::Stream => "Video",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a definition names a permission token we don't know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|cap| cap.token() == token)
            .ok_or_else(|| UnknownCapability(token.to_string()))
    }
}

/// An ordered set of capabilities. Ordering keeps "missing permission"
/// listings stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse a list of definition tokens, stopping at the first unknown one.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, UnknownCapability> {
        tokens
            .iter()
            .map(|token| token.as_ref().parse::<Capability>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// Capabilities required by `self` that `held` does not cover.
    pub fn missing_from(&self, held: &CapabilitySet) -> CapabilitySet {
        Self(self.0.difference(&held.0).copied().collect())
    }

    pub fn is_subset(&self, held: &CapabilitySet) -> bool {
        self.0.is_subset(&held.0)
    }

    /// Labels joined one per line, the way denial replies list them.
    pub fn describe(&self) -> String {
        self.iter()
            .map(|cap| cap.label())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Capability; N]> for CapabilitySet {
    fn from(caps: [Capability; N]) -> Self {
        caps.into_iter().collect()
    }
}
