// Config service - keeps the guild config cache and the store in step.
//
// Reads go to the cache only; the dispatch hot path never waits on the
// store. Writes go to the store first and only then to the cache, so a failed
// write leaves both untouched.

use super::config_models::{ConfigCache, ConfigUpdate, GuildConfig};
use crate::core::store::{GuildConfigStore, StoreError};
use std::sync::Arc;

pub struct ConfigService {
    store: Arc<dyn GuildConfigStore>,
    cache: ConfigCache,
    default_prefix: String,
}

impl ConfigService {
    pub fn new(store: Arc<dyn GuildConfigStore>, default_prefix: impl Into<String>) -> Self {
        Self {
            store,
            cache: ConfigCache::new(),
            default_prefix: default_prefix.into(),
        }
    }

    /// Load every stored config into the cache. Returns how many were loaded.
    pub async fn warm(&self) -> Result<usize, StoreError> {
        let configs = self.store.load_all().await?;
        let count = configs.len();
        for config in configs {
            self.cache.insert(config);
        }
        tracing::info!(guilds = count, "Guild config cache warmed");
        Ok(count)
    }

    /// Make sure the guild has a stored and cached config. Returns whether a
    /// new one had to be created.
    pub async fn ensure_guild(
        &self,
        guild_id: u64,
        system_channel_id: Option<u64>,
    ) -> Result<bool, StoreError> {
        if let Some(existing) = self.store.get_config(guild_id).await? {
            self.cache.insert(existing);
            return Ok(false);
        }

        let mut config = GuildConfig::new(guild_id, self.default_prefix.clone());
        config.system_channel_id = system_channel_id;

        let created = self.store.insert_config(&config).await?;
        if created {
            self.cache.insert(config);
        } else if let Some(existing) = self.store.get_config(guild_id).await? {
            // Somebody else created it between our read and insert
            self.cache.insert(existing);
        }
        Ok(created)
    }

    pub fn get(&self, guild_id: u64) -> Option<GuildConfig> {
        self.cache.get(guild_id)
    }

    /// The guild's prefix, or the default when the guild isn't cached yet.
    pub fn prefix_for(&self, guild_id: u64) -> String {
        self.cache
            .prefix(guild_id)
            .unwrap_or_else(|| self.default_prefix.clone())
    }

    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    pub async fn update(&self, guild_id: u64, update: ConfigUpdate) -> Result<(), StoreError> {
        self.store.apply_update(guild_id, &update).await?;

        if !self.cache.update(guild_id, &update) {
            // Not cached yet: pull the row we just wrote
            if let Some(config) = self.store.get_config(guild_id).await? {
                self.cache.insert(config);
            }
        }

        tracing::info!(guild_id, field = update.field_name(), "Guild config updated");
        Ok(())
    }

    pub async fn remove_guild(&self, guild_id: u64) -> Result<(), StoreError> {
        self.store.delete_config(guild_id).await?;
        self.cache.remove(guild_id);
        Ok(())
    }

    /// Guild ids known to the cache, sorted.
    pub fn guild_ids(&self) -> Vec<u64> {
        self.cache.guild_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::InMemoryGuildStore;
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl GuildConfigStore for BrokenStore {
        async fn load_all(&self) -> Result<Vec<GuildConfig>, StoreError> {
            Err(StoreError::StorageError("disk on fire".into()))
        }

        async fn get_config(&self, _: u64) -> Result<Option<GuildConfig>, StoreError> {
            Err(StoreError::StorageError("disk on fire".into()))
        }

        async fn insert_config(&self, _: &GuildConfig) -> Result<bool, StoreError> {
            Err(StoreError::StorageError("disk on fire".into()))
        }

        async fn apply_update(&self, _: u64, _: &ConfigUpdate) -> Result<(), StoreError> {
            Err(StoreError::StorageError("disk on fire".into()))
        }

        async fn delete_config(&self, _: u64) -> Result<(), StoreError> {
            Err(StoreError::StorageError("disk on fire".into()))
        }
    }

    #[tokio::test]
    async fn ensure_guild_creates_once_and_caches() {
        let service = ConfigService::new(Arc::new(InMemoryGuildStore::new()), "!!");

        assert!(service.ensure_guild(42, Some(7)).await.unwrap());
        assert!(!service.ensure_guild(42, Some(8)).await.unwrap());

        let config = service.get(42).unwrap();
        assert_eq!(config.prefix, "!!");
        assert_eq!(config.system_channel_id, Some(7));
    }

    #[tokio::test]
    async fn update_writes_store_and_cache() {
        let store = Arc::new(InMemoryGuildStore::new());
        let service = ConfigService::new(store.clone(), "!!");
        service.ensure_guild(42, None).await.unwrap();

        service
            .update(42, ConfigUpdate::Prefix("?".into()))
            .await
            .unwrap();

        assert_eq!(service.prefix_for(42), "?");
        let stored = store.get_config(42).await.unwrap().unwrap();
        assert_eq!(stored.prefix, "?");
    }

    #[tokio::test]
    async fn warm_fills_cache_from_store() {
        let store = Arc::new(InMemoryGuildStore::new());
        store.insert_config(&GuildConfig::new(1, "!!")).await.unwrap();
        store.insert_config(&GuildConfig::new(2, "$")).await.unwrap();

        let service = ConfigService::new(store, "!!");
        assert_eq!(service.warm().await.unwrap(), 2);
        assert_eq!(service.prefix_for(2), "$");
        assert_eq!(service.guild_ids(), vec![1, 2]);
    }

    #[tokio::test]
    async fn failed_store_write_leaves_cache_alone() {
        let service = ConfigService::new(Arc::new(BrokenStore), "!!");
        service.cache.insert(GuildConfig::new(42, "!!"));

        let result = service.update(42, ConfigUpdate::Prefix("?".into())).await;
        assert!(result.is_err());
        assert_eq!(service.prefix_for(42), "!!");
    }

    #[tokio::test]
    async fn unknown_guild_uses_default_prefix() {
        let service = ConfigService::new(Arc::new(InMemoryGuildStore::new()), "!!");
        assert_eq!(service.prefix_for(99), "!!");
    }

    #[tokio::test]
    async fn remove_guild_clears_both_sides() {
        let store = Arc::new(InMemoryGuildStore::new());
        let service = ConfigService::new(store.clone(), "!!");
        service.ensure_guild(42, None).await.unwrap();

        service.remove_guild(42).await.unwrap();
        assert!(service.get(42).is_none());
        assert!(store.get_config(42).await.unwrap().is_none());
    }
}
