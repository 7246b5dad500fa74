// In-memory implementation of the guild stores.
//
// Used by the test suites and when the bot runs without a database file.
// Nothing is persisted.

use crate::core::config::{ConfigUpdate, GuildConfig};
use crate::core::store::{
    GuildConfigStore, MembershipRecord, MembershipStore, StoreError, WarnRecord, WarnStore,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Composite key, a user can be in many guilds.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
struct MemberKey {
    guild_id: u64,
    user_id: u64,
}

#[derive(Default)]
pub struct InMemoryGuildStore {
    configs: DashMap<u64, GuildConfig>,
    warns: DashMap<MemberKey, Vec<WarnRecord>>,
    members: DashMap<MemberKey, MembershipRecord>,
}

impl InMemoryGuildStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GuildConfigStore for InMemoryGuildStore {
    async fn load_all(&self) -> Result<Vec<GuildConfig>, StoreError> {
        let mut configs: Vec<GuildConfig> =
            self.configs.iter().map(|entry| entry.value().clone()).collect();
        configs.sort_by_key(|c| c.guild_id);
        Ok(configs)
    }

    async fn get_config(&self, guild_id: u64) -> Result<Option<GuildConfig>, StoreError> {
        Ok(self.configs.get(&guild_id).map(|c| c.clone()))
    }

    async fn insert_config(&self, config: &GuildConfig) -> Result<bool, StoreError> {
        // entry() keeps check-and-insert atomic against concurrent guild joins
        match self.configs.entry(config.guild_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(config.clone());
                Ok(true)
            }
        }
    }

    async fn apply_update(&self, guild_id: u64, update: &ConfigUpdate) -> Result<(), StoreError> {
        let mut config = self
            .configs
            .get_mut(&guild_id)
            .ok_or(StoreError::MissingGuild(guild_id))?;
        config.apply(update);
        Ok(())
    }

    async fn delete_config(&self, guild_id: u64) -> Result<(), StoreError> {
        self.configs.remove(&guild_id);
        Ok(())
    }
}

#[async_trait]
impl WarnStore for InMemoryGuildStore {
    async fn add_warn(
        &self,
        guild_id: u64,
        user_id: u64,
        record: WarnRecord,
    ) -> Result<usize, StoreError> {
        let mut warns = self
            .warns
            .entry(MemberKey { guild_id, user_id })
            .or_default();
        warns.push(record);
        Ok(warns.len())
    }

    async fn list_warns(&self, guild_id: u64, user_id: u64) -> Result<Vec<WarnRecord>, StoreError> {
        Ok(self
            .warns
            .get(&MemberKey { guild_id, user_id })
            .map(|w| w.clone())
            .unwrap_or_default())
    }

    async fn clear_warns(&self, guild_id: u64, user_id: u64) -> Result<usize, StoreError> {
        Ok(self
            .warns
            .remove(&MemberKey { guild_id, user_id })
            .map(|(_, w)| w.len())
            .unwrap_or(0))
    }

    async fn clear_guild_warns(&self, guild_id: u64) -> Result<(), StoreError> {
        self.warns.retain(|key, _| key.guild_id != guild_id);
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for InMemoryGuildStore {
    async fn add_member(&self, record: MembershipRecord) -> Result<(), StoreError> {
        let key = MemberKey {
            guild_id: record.guild_id,
            user_id: record.user_id,
        };
        self.members.insert(key, record);
        Ok(())
    }

    async fn remove_member(&self, guild_id: u64, user_id: u64) -> Result<(), StoreError> {
        self.members.remove(&MemberKey { guild_id, user_id });
        Ok(())
    }

    async fn list_members(&self, guild_id: u64) -> Result<Vec<MembershipRecord>, StoreError> {
        let mut members: Vec<MembershipRecord> = self
            .members
            .iter()
            .filter(|entry| entry.key().guild_id == guild_id)
            .map(|entry| entry.value().clone())
            .collect();
        members.sort_by_key(|m| (m.joined_at, m.user_id));
        Ok(members)
    }

    async fn remove_guild_members(&self, guild_id: u64) -> Result<(), StoreError> {
        self.members.retain(|key, _| key.guild_id != guild_id);
        Ok(())
    }
}
