// SQLite-backed storage for guild configuration, warnings and members.
//
// Tables:
// - guild_configs: one row per guild, scalar settings
// - mod_only_channels: channel ids restricted to mod commands
// - warns: one row per warning, ordered by insertion
// - guild_members: membership rows, keyed by (guild_id, user_id)

use crate::core::config::{ConfigUpdate, GuildConfig};
use crate::core::store::{
    GuildConfigStore, MembershipRecord, MembershipStore, StoreError, WarnRecord, WarnStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

fn storage(e: sqlx::Error) -> StoreError {
    StoreError::StorageError(e.to_string())
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub struct SqliteGuildStore {
    pool: Pool<Sqlite>,
}

impl SqliteGuildStore {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn open(database_path: &str) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::StorageError(e.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", database_path))
            .map_err(storage)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(storage)?;

        let store = Self::new(pool);
        store.migrate().await?;
        info!(path = %database_path, "Opened guild database");
        Ok(store)
    }

    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Create required tables.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_configs (
                guild_id INTEGER PRIMARY KEY,
                prefix TEXT NOT NULL,
                system_channel_id INTEGER,
                mod_log_channel_id INTEGER,
                member_log_channel_id INTEGER,
                message_edit_log_channel_id INTEGER,
                message_delete_log_channel_id INTEGER,
                admin_role_id INTEGER,
                mod_role_id INTEGER,
                mute_role_id INTEGER,
                auto_role_id INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mod_only_channels (
                guild_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                PRIMARY KEY (guild_id, channel_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                moderator_id INTEGER NOT NULL,
                issued_at TEXT NOT NULL,
                reason TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_warns_guild_user
                ON warns(guild_id, user_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_members (
                guild_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                display_name TEXT NOT NULL,
                joined_at TEXT NOT NULL,
                PRIMARY KEY (guild_id, user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn mod_only_channels(&self, guild_id: u64) -> Result<Vec<u64>, StoreError> {
        let rows = sqlx::query(
            "SELECT channel_id FROM mod_only_channels WHERE guild_id = ? ORDER BY channel_id",
        )
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .iter()
            .map(|row| row.get::<i64, _>("channel_id") as u64)
            .collect())
    }
}

fn optional_id(row: &SqliteRow, column: &str) -> Option<u64> {
    row.get::<Option<i64>, _>(column).map(|id| id as u64)
}

fn config_from_row(row: &SqliteRow, mod_only_channels: Vec<u64>) -> GuildConfig {
    GuildConfig {
        guild_id: row.get::<i64, _>("guild_id") as u64,
        prefix: row.get("prefix"),
        system_channel_id: optional_id(row, "system_channel_id"),
        mod_log_channel_id: optional_id(row, "mod_log_channel_id"),
        member_log_channel_id: optional_id(row, "member_log_channel_id"),
        message_edit_log_channel_id: optional_id(row, "message_edit_log_channel_id"),
        message_delete_log_channel_id: optional_id(row, "message_delete_log_channel_id"),
        admin_role_id: optional_id(row, "admin_role_id"),
        mod_role_id: optional_id(row, "mod_role_id"),
        mute_role_id: optional_id(row, "mute_role_id"),
        auto_role_id: optional_id(row, "auto_role_id"),
        mod_only_channels,
    }
}

/// Column written by an id-valued update. `None` for updates that are not a
/// single nullable id column.
fn id_column(update: &ConfigUpdate) -> Option<(&'static str, Option<u64>)> {
    let column = match update {
        ConfigUpdate::SystemChannel(id) => ("system_channel_id", *id),
        ConfigUpdate::ModLogChannel(id) => ("mod_log_channel_id", *id),
        ConfigUpdate::MemberLogChannel(id) => ("member_log_channel_id", *id),
        ConfigUpdate::MessageEditLogChannel(id) => ("message_edit_log_channel_id", *id),
        ConfigUpdate::MessageDeleteLogChannel(id) => ("message_delete_log_channel_id", *id),
        ConfigUpdate::AdminRole(id) => ("admin_role_id", *id),
        ConfigUpdate::ModRole(id) => ("mod_role_id", *id),
        ConfigUpdate::MuteRole(id) => ("mute_role_id", *id),
        ConfigUpdate::AutoRole(id) => ("auto_role_id", *id),
        ConfigUpdate::Prefix(_) | ConfigUpdate::ModOnlyChannels(_) => return None,
    };
    Some(column)
}

#[async_trait]
impl GuildConfigStore for SqliteGuildStore {
    async fn load_all(&self) -> Result<Vec<GuildConfig>, StoreError> {
        let rows = sqlx::query("SELECT * FROM guild_configs ORDER BY guild_id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        let channel_rows =
            sqlx::query("SELECT guild_id, channel_id FROM mod_only_channels ORDER BY channel_id")
                .fetch_all(&self.pool)
                .await
                .map_err(storage)?;

        let mut channels: HashMap<u64, Vec<u64>> = HashMap::new();
        for row in &channel_rows {
            channels
                .entry(row.get::<i64, _>("guild_id") as u64)
                .or_default()
                .push(row.get::<i64, _>("channel_id") as u64);
        }

        Ok(rows
            .iter()
            .map(|row| {
                let guild_id = row.get::<i64, _>("guild_id") as u64;
                config_from_row(row, channels.remove(&guild_id).unwrap_or_default())
            })
            .collect())
    }

    async fn get_config(&self, guild_id: u64) -> Result<Option<GuildConfig>, StoreError> {
        let row = sqlx::query("SELECT * FROM guild_configs WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        match row {
            Some(row) => {
                let channels = self.mod_only_channels(guild_id).await?;
                Ok(Some(config_from_row(&row, channels)))
            }
            None => Ok(None),
        }
    }

    async fn insert_config(&self, config: &GuildConfig) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let result = sqlx::query(
            r#"
            INSERT INTO guild_configs (
                guild_id, prefix, system_channel_id, mod_log_channel_id,
                member_log_channel_id, message_edit_log_channel_id,
                message_delete_log_channel_id, admin_role_id, mod_role_id,
                mute_role_id, auto_role_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id) DO NOTHING
            "#,
        )
        .bind(config.guild_id as i64)
        .bind(&config.prefix)
        .bind(config.system_channel_id.map(|id| id as i64))
        .bind(config.mod_log_channel_id.map(|id| id as i64))
        .bind(config.member_log_channel_id.map(|id| id as i64))
        .bind(config.message_edit_log_channel_id.map(|id| id as i64))
        .bind(config.message_delete_log_channel_id.map(|id| id as i64))
        .bind(config.admin_role_id.map(|id| id as i64))
        .bind(config.mod_role_id.map(|id| id as i64))
        .bind(config.mute_role_id.map(|id| id as i64))
        .bind(config.auto_role_id.map(|id| id as i64))
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        let created = result.rows_affected() > 0;
        if created {
            for channel_id in &config.mod_only_channels {
                sqlx::query(
                    "INSERT OR IGNORE INTO mod_only_channels (guild_id, channel_id) VALUES (?, ?)",
                )
                .bind(config.guild_id as i64)
                .bind(*channel_id as i64)
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
            }
        }

        tx.commit().await.map_err(storage)?;
        Ok(created)
    }

    async fn apply_update(&self, guild_id: u64, update: &ConfigUpdate) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let affected = match update {
            ConfigUpdate::Prefix(prefix) => {
                sqlx::query("UPDATE guild_configs SET prefix = ? WHERE guild_id = ?")
                    .bind(prefix)
                    .bind(guild_id as i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage)?
                    .rows_affected()
            }
            ConfigUpdate::ModOnlyChannels(channel_ids) => {
                let exists = sqlx::query("SELECT 1 FROM guild_configs WHERE guild_id = ?")
                    .bind(guild_id as i64)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(storage)?
                    .is_some();

                if exists {
                    sqlx::query("DELETE FROM mod_only_channels WHERE guild_id = ?")
                        .bind(guild_id as i64)
                        .execute(&mut *tx)
                        .await
                        .map_err(storage)?;

                    for channel_id in channel_ids {
                        sqlx::query(
                            "INSERT OR IGNORE INTO mod_only_channels (guild_id, channel_id) VALUES (?, ?)",
                        )
                        .bind(guild_id as i64)
                        .bind(*channel_id as i64)
                        .execute(&mut *tx)
                        .await
                        .map_err(storage)?;
                    }
                }
                u64::from(exists)
            }
            other => {
                let Some((column, value)) = id_column(other) else {
                    return Ok(());
                };
                // Column names come from the fixed table above
                let sql = format!("UPDATE guild_configs SET {} = ? WHERE guild_id = ?", column);
                sqlx::query(&sql)
                    .bind(value.map(|id| id as i64))
                    .bind(guild_id as i64)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage)?
                    .rows_affected()
            }
        };

        if affected == 0 {
            return Err(StoreError::MissingGuild(guild_id));
        }

        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn delete_config(&self, guild_id: u64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query("DELETE FROM mod_only_channels WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        sqlx::query("DELETE FROM guild_configs WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(())
    }
}

#[async_trait]
impl WarnStore for SqliteGuildStore {
    async fn add_warn(
        &self,
        guild_id: u64,
        user_id: u64,
        record: WarnRecord,
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            r#"
            INSERT INTO warns (guild_id, user_id, moderator_id, issued_at, reason)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .bind(record.moderator_id as i64)
        .bind(record.issued_at.to_rfc3339())
        .bind(&record.reason)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM warns WHERE guild_id = ? AND user_id = ?")
                .bind(guild_id as i64)
                .bind(user_id as i64)
                .fetch_one(&mut *tx)
                .await
                .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(count as usize)
    }

    async fn list_warns(&self, guild_id: u64, user_id: u64) -> Result<Vec<WarnRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT moderator_id, issued_at, reason
            FROM warns
            WHERE guild_id = ? AND user_id = ?
            ORDER BY id
            "#,
        )
        .bind(guild_id as i64)
        .bind(user_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .iter()
            .map(|row| WarnRecord {
                moderator_id: row.get::<i64, _>("moderator_id") as u64,
                issued_at: parse_timestamp(&row.get::<String, _>("issued_at")),
                reason: row.get("reason"),
            })
            .collect())
    }

    async fn clear_warns(&self, guild_id: u64, user_id: u64) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM warns WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() as usize)
    }

    async fn clear_guild_warns(&self, guild_id: u64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM warns WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

#[async_trait]
impl MembershipStore for SqliteGuildStore {
    async fn add_member(&self, record: MembershipRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO guild_members (guild_id, user_id, display_name, joined_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(guild_id, user_id) DO UPDATE SET
                display_name = excluded.display_name,
                joined_at = excluded.joined_at
            "#,
        )
        .bind(record.guild_id as i64)
        .bind(record.user_id as i64)
        .bind(&record.display_name)
        .bind(record.joined_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn remove_member(&self, guild_id: u64, user_id: u64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM guild_members WHERE guild_id = ? AND user_id = ?")
            .bind(guild_id as i64)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn list_members(&self, guild_id: u64) -> Result<Vec<MembershipRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, display_name, joined_at
            FROM guild_members
            WHERE guild_id = ?
            ORDER BY joined_at, user_id
            "#,
        )
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .iter()
            .map(|row| MembershipRecord {
                guild_id,
                user_id: row.get::<i64, _>("user_id") as u64,
                display_name: row.get("display_name"),
                joined_at: parse_timestamp(&row.get::<String, _>("joined_at")),
            })
            .collect())
    }

    async fn remove_guild_members(&self, guild_id: u64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM guild_members WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (SqliteGuildStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guilds.db");
        let store = SqliteGuildStore::open(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn config_round_trips_with_mod_channels() {
        let (store, _dir) = open_store().await;

        let mut config = GuildConfig::new(1, "!!");
        config.system_channel_id = Some(5);
        config.mod_only_channels = vec![30, 20];
        assert!(store.insert_config(&config).await.unwrap());
        assert!(!store.insert_config(&GuildConfig::new(1, "$")).await.unwrap());

        let stored = store.get_config(1).await.unwrap().unwrap();
        assert_eq!(stored.prefix, "!!");
        assert_eq!(stored.system_channel_id, Some(5));
        assert_eq!(stored.mod_only_channels, vec![20, 30]);
    }

    #[tokio::test]
    async fn updates_write_single_fields() {
        let (store, _dir) = open_store().await;
        store.insert_config(&GuildConfig::new(1, "!!")).await.unwrap();

        store
            .apply_update(1, &ConfigUpdate::Prefix("?".into()))
            .await
            .unwrap();
        store
            .apply_update(1, &ConfigUpdate::MuteRole(Some(44)))
            .await
            .unwrap();
        store
            .apply_update(1, &ConfigUpdate::ModOnlyChannels(vec![7]))
            .await
            .unwrap();

        let stored = store.get_config(1).await.unwrap().unwrap();
        assert_eq!(stored.prefix, "?");
        assert_eq!(stored.mute_role_id, Some(44));
        assert_eq!(stored.mod_only_channels, vec![7]);

        store
            .apply_update(1, &ConfigUpdate::MuteRole(None))
            .await
            .unwrap();
        assert_eq!(store.get_config(1).await.unwrap().unwrap().mute_role_id, None);
    }

    #[tokio::test]
    async fn update_of_missing_guild_fails() {
        let (store, _dir) = open_store().await;
        let err = store
            .apply_update(3, &ConfigUpdate::ModLogChannel(Some(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingGuild(3)));

        let err = store
            .apply_update(3, &ConfigUpdate::ModOnlyChannels(vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingGuild(3)));
    }

    #[tokio::test]
    async fn load_all_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guilds.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteGuildStore::open(path).await.unwrap();
            store.insert_config(&GuildConfig::new(2, "$")).await.unwrap();
            let mut first = GuildConfig::new(1, "!!");
            first.mod_only_channels = vec![9];
            store.insert_config(&first).await.unwrap();
        }

        let store = SqliteGuildStore::open(path).await.unwrap();
        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].guild_id, 1);
        assert_eq!(all[0].mod_only_channels, vec![9]);
        assert_eq!(all[1].prefix, "$");
    }

    #[tokio::test]
    async fn warns_keep_insertion_order() {
        let (store, _dir) = open_store().await;
        for (i, reason) in ["spam", "insults"].iter().enumerate() {
            let count = store
                .add_warn(
                    1,
                    10,
                    WarnRecord {
                        moderator_id: 2,
                        issued_at: Utc::now(),
                        reason: reason.to_string(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(count, i + 1);
        }

        let warns = store.list_warns(1, 10).await.unwrap();
        assert_eq!(warns.len(), 2);
        assert_eq!(warns[0].reason, "spam");
        assert_eq!(warns[1].moderator_id, 2);

        assert_eq!(store.clear_warns(1, 10).await.unwrap(), 2);
        assert!(store.list_warns(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn member_rows_upsert_and_remove() {
        let (store, _dir) = open_store().await;
        let record = MembershipRecord {
            guild_id: 1,
            user_id: 10,
            display_name: "before".into(),
            joined_at: Utc::now(),
        };
        store.add_member(record.clone()).await.unwrap();
        store
            .add_member(MembershipRecord {
                display_name: "after".into(),
                ..record
            })
            .await
            .unwrap();

        let members = store.list_members(1).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].display_name, "after");

        store.remove_member(1, 10).await.unwrap();
        assert!(store.list_members(1).await.unwrap().is_empty());
    }
}
