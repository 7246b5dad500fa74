// Process settings, read from the environment (and `.env`) at startup.

use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_PREFIX: &str = "!!";
pub const DEFAULT_DATABASE_PATH: &str = "data/bot.db";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Missing {0} environment variable! Create a .env file with your bot settings.")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSettings {
    pub token: String,
    pub owner_ids: Vec<u64>,
    /// Prefix given to guilds that haven't set their own.
    pub default_prefix: String,
    pub database_path: String,
}

impl BotSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_vars(&std::env::vars().collect())
    }

    fn from_vars(vars: &HashMap<String, String>) -> Result<Self, SettingsError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let token = get("DISCORD_TOKEN").ok_or(SettingsError::Missing("DISCORD_TOKEN"))?;

        let owner_ids = get("OWNER_IDS")
            .ok_or(SettingsError::Missing("OWNER_IDS"))?
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse::<u64>().map_err(|_| SettingsError::Invalid {
                    name: "OWNER_IDS",
                    reason: format!("`{}` is not a user id", id),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if owner_ids.is_empty() {
            return Err(SettingsError::Invalid {
                name: "OWNER_IDS",
                reason: "at least one owner is required".to_string(),
            });
        }

        let default_prefix = get("BOT_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        if default_prefix.chars().count() > 3 {
            return Err(SettingsError::Invalid {
                name: "BOT_PREFIX",
                reason: "prefixes are at most 3 characters".to_string(),
            });
        }

        let database_path = get("DATABASE_PATH")
            .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        Ok(Self {
            token,
            owner_ids,
            default_prefix,
            database_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_fill_in_optional_values() {
        let settings =
            BotSettings::from_vars(&vars(&[("DISCORD_TOKEN", "abc"), ("OWNER_IDS", "1, 2")]))
                .unwrap();
        assert_eq!(settings.owner_ids, vec![1, 2]);
        assert_eq!(settings.default_prefix, "!!");
        assert_eq!(settings.database_path, "data/bot.db");
    }

    #[test]
    fn token_and_owners_are_required() {
        assert_eq!(
            BotSettings::from_vars(&vars(&[("OWNER_IDS", "1")])),
            Err(SettingsError::Missing("DISCORD_TOKEN"))
        );
        assert_eq!(
            BotSettings::from_vars(&vars(&[("DISCORD_TOKEN", "abc"), ("OWNER_IDS", " ")])),
            Err(SettingsError::Missing("OWNER_IDS"))
        );
        assert!(matches!(
            BotSettings::from_vars(&vars(&[("DISCORD_TOKEN", "abc"), ("OWNER_IDS", "me")])),
            Err(SettingsError::Invalid { name: "OWNER_IDS", .. })
        ));
    }

    #[test]
    fn long_prefixes_are_rejected() {
        let result = BotSettings::from_vars(&vars(&[
            ("DISCORD_TOKEN", "abc"),
            ("OWNER_IDS", "1"),
            ("BOT_PREFIX", "bot!"),
        ]));
        assert!(matches!(result, Err(SettingsError::Invalid { name: "BOT_PREFIX", .. })));
    }
}
