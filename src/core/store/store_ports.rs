// Storage ports shared by the config, moderation and membership features.
//
// The infra layer provides a SQLite implementation and an in-memory one.
// Only plain data crosses these traits.

use crate::core::config::{ConfigUpdate, GuildConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("No configuration stored for guild {0}")]
    MissingGuild(u64),
}

/// A single warning handed out by a moderator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarnRecord {
    pub moderator_id: u64,
    pub issued_at: DateTime<Utc>,
    pub reason: String,
}

impl WarnRecord {
    /// Date as shown in warn listings, e.g. `Mar 04 2024`.
    pub fn display_date(&self) -> String {
        self.issued_at.format("%b %d %Y").to_string()
    }
}

/// A member row, kept for every member of every guild the bot is in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub guild_id: u64,
    pub user_id: u64,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

#[async_trait]
pub trait GuildConfigStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<GuildConfig>, StoreError>;

    async fn get_config(&self, guild_id: u64) -> Result<Option<GuildConfig>, StoreError>;

    /// Insert unless a row already exists. Returns whether it was created.
    async fn insert_config(&self, config: &GuildConfig) -> Result<bool, StoreError>;

    /// Write a single field. Fails with `MissingGuild` if there is no row.
    async fn apply_update(&self, guild_id: u64, update: &ConfigUpdate) -> Result<(), StoreError>;

    async fn delete_config(&self, guild_id: u64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait WarnStore: Send + Sync {
    /// Append a warning. Returns the member's new warning count.
    async fn add_warn(&self, guild_id: u64, user_id: u64, record: WarnRecord) -> Result<usize, StoreError>;

    /// Oldest first.
    async fn list_warns(&self, guild_id: u64, user_id: u64) -> Result<Vec<WarnRecord>, StoreError>;

    /// Returns how many were removed.
    async fn clear_warns(&self, guild_id: u64, user_id: u64) -> Result<usize, StoreError>;

    async fn clear_guild_warns(&self, guild_id: u64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn add_member(&self, record: MembershipRecord) -> Result<(), StoreError>;

    async fn remove_member(&self, guild_id: u64, user_id: u64) -> Result<(), StoreError>;

    async fn list_members(&self, guild_id: u64) -> Result<Vec<MembershipRecord>, StoreError>;

    async fn remove_guild_members(&self, guild_id: u64) -> Result<(), StoreError>;
}
