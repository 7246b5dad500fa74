use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Per-guild settings. The cached copy is what dispatch reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub guild_id: u64,
    pub prefix: String,
    pub system_channel_id: Option<u64>,
    pub mod_log_channel_id: Option<u64>,
    pub member_log_channel_id: Option<u64>,
    pub message_edit_log_channel_id: Option<u64>,
    pub message_delete_log_channel_id: Option<u64>,
    pub admin_role_id: Option<u64>,
    pub mod_role_id: Option<u64>,
    pub mute_role_id: Option<u64>,
    pub auto_role_id: Option<u64>,
    /// Channels where only mod commands run.
    pub mod_only_channels: Vec<u64>,
}

impl GuildConfig {
    pub fn new(guild_id: u64, prefix: impl Into<String>) -> Self {
        Self {
            guild_id,
            prefix: prefix.into(),
            system_channel_id: None,
            mod_log_channel_id: None,
            member_log_channel_id: None,
            message_edit_log_channel_id: None,
            message_delete_log_channel_id: None,
            admin_role_id: None,
            mod_role_id: None,
            mute_role_id: None,
            auto_role_id: None,
            mod_only_channels: Vec::new(),
        }
    }

    pub fn apply(&mut self, update: &ConfigUpdate) {
        match update {
            ConfigUpdate::Prefix(prefix) => self.prefix = prefix.clone(),
            ConfigUpdate::SystemChannel(id) => self.system_channel_id = *id,
            ConfigUpdate::ModLogChannel(id) => self.mod_log_channel_id = *id,
            ConfigUpdate::MemberLogChannel(id) => self.member_log_channel_id = *id,
            ConfigUpdate::MessageEditLogChannel(id) => self.message_edit_log_channel_id = *id,
            ConfigUpdate::MessageDeleteLogChannel(id) => self.message_delete_log_channel_id = *id,
            ConfigUpdate::AdminRole(id) => self.admin_role_id = *id,
            ConfigUpdate::ModRole(id) => self.mod_role_id = *id,
            ConfigUpdate::MuteRole(id) => self.mute_role_id = *id,
            ConfigUpdate::AutoRole(id) => self.auto_role_id = *id,
            ConfigUpdate::ModOnlyChannels(ids) => self.mod_only_channels = ids.clone(),
        }
    }

    pub fn is_mod_only_channel(&self, channel_id: u64) -> bool {
        self.mod_only_channels.contains(&channel_id)
    }
}

/// A single-field change to a guild's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigUpdate {
    Prefix(String),
    SystemChannel(Option<u64>),
    ModLogChannel(Option<u64>),
    MemberLogChannel(Option<u64>),
    MessageEditLogChannel(Option<u64>),
    MessageDeleteLogChannel(Option<u64>),
    AdminRole(Option<u64>),
    ModRole(Option<u64>),
    MuteRole(Option<u64>),
    AutoRole(Option<u64>),
    ModOnlyChannels(Vec<u64>),
}

impl ConfigUpdate {
    /// Human name of the field, used in logs and replies.
    pub fn field_name(&self) -> &'static str {
        match self {
            ConfigUpdate::Prefix(_) => "prefix",
            ConfigUpdate::SystemChannel(_) => "system channel",
            ConfigUpdate::ModLogChannel(_) => "mod log",
            ConfigUpdate::MemberLogChannel(_) => "member log",
            ConfigUpdate::MessageEditLogChannel(_) => "message edit log",
            ConfigUpdate::MessageDeleteLogChannel(_) => "message delete log",
            ConfigUpdate::AdminRole(_) => "admin role",
            ConfigUpdate::ModRole(_) => "mod role",
            ConfigUpdate::MuteRole(_) => "mute role",
            ConfigUpdate::AutoRole(_) => "auto role",
            ConfigUpdate::ModOnlyChannels(_) => "mod only channels",
        }
    }
}

/// In-memory guild id -> config map. Reads hand out snapshots so nobody holds
/// a map lock across an await.
#[derive(Default)]
pub struct ConfigCache {
    configs: DashMap<u64, GuildConfig>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: u64) -> Option<GuildConfig> {
        self.configs.get(&guild_id).map(|c| c.clone())
    }

    pub fn prefix(&self, guild_id: u64) -> Option<String> {
        self.configs.get(&guild_id).map(|c| c.prefix.clone())
    }

    pub fn insert(&self, config: GuildConfig) {
        self.configs.insert(config.guild_id, config);
    }

    /// Mutate the cached record in place. Returns false when the guild isn't cached.
    pub fn update(&self, guild_id: u64, update: &ConfigUpdate) -> bool {
        match self.configs.get_mut(&guild_id) {
            Some(mut config) => {
                config.apply(update);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, guild_id: u64) -> Option<GuildConfig> {
        self.configs.remove(&guild_id).map(|(_, config)| config)
    }

    /// Cached guild ids, sorted.
    pub fn guild_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.configs.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_mutates_the_cached_record() {
        let cache = ConfigCache::new();
        cache.insert(GuildConfig::new(1, "!!"));

        assert!(cache.update(1, &ConfigUpdate::Prefix("?".into())));
        assert!(cache.update(1, &ConfigUpdate::ModOnlyChannels(vec![10, 11])));

        let config = cache.get(1).unwrap();
        assert_eq!(config.prefix, "?");
        assert!(config.is_mod_only_channel(11));
        assert!(!config.is_mod_only_channel(12));
    }

    #[test]
    fn update_of_unknown_guild_is_reported() {
        let cache = ConfigCache::new();
        assert!(!cache.update(5, &ConfigUpdate::MuteRole(Some(3))));
        assert!(cache.get(5).is_none());
    }
}
