// Guild configuration: the cached record, single-field updates and the
// service that keeps cache and store consistent.

pub mod config_models;
pub mod config_service;

pub use config_models::{ConfigCache, ConfigUpdate, GuildConfig};
pub use config_service::ConfigService;
