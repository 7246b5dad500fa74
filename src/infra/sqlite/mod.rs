// SQLite storage implementation

mod sqlite_guild_store;

pub use sqlite_guild_store::SqliteGuildStore;
