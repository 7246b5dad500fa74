// Command registry - name/alias lookup built once at startup.
//
// Loading is partial-failure tolerant: a definition that fails validation is
// logged and skipped, everything registered before it stays put. After the
// load phase the registry is wrapped in an Arc and only ever read.

use super::capabilities::CapabilitySet;
use super::command_models::{Command, CommandCategory, CommandDefinition};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Command name `{0}` is already registered")]
    DuplicateName(String),

    #[error("Alias `{alias}` of `{command}` is already taken")]
    DuplicateAlias { command: String, alias: String },

    #[error("Command name `{0}` is empty or not lowercase")]
    InvalidName(String),

    #[error("Alias `{alias}` of `{command}` is empty, not lowercase or repeated")]
    InvalidAlias { command: String, alias: String },

    #[error("Command `{command}` names unknown permission `{token}`")]
    InvalidCapabilityToken { command: String, token: String },

    #[error("Command `{command}` has unknown category `{category}`")]
    InvalidType { command: String, category: String },
}

fn is_valid_identifier(value: &str) -> bool {
    !value.trim().is_empty() && value == value.to_lowercase() && !value.contains(' ')
}

#[derive(Default)]
pub struct CommandRegistry {
    // Registration order, used for listings
    commands: Vec<Arc<Command>>,
    by_name: HashMap<String, Arc<Command>>,
    by_alias: HashMap<String, Arc<Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a definition and make it resolvable. Nothing is changed when
    /// validation fails.
    pub fn register(&mut self, definition: CommandDefinition) -> Result<Arc<Command>, RegistrationError> {
        let command = self.validate(definition)?;
        let command = Arc::new(command);

        self.by_name.insert(command.name.clone(), Arc::clone(&command));
        for alias in &command.aliases {
            self.by_alias.insert(alias.clone(), Arc::clone(&command));
        }
        self.commands.push(Arc::clone(&command));

        Ok(command)
    }

    fn validate(&self, definition: CommandDefinition) -> Result<Command, RegistrationError> {
        let name = definition.name;

        if !is_valid_identifier(&name) {
            return Err(RegistrationError::InvalidName(name));
        }
        if self.by_name.contains_key(&name) || self.by_alias.contains_key(&name) {
            return Err(RegistrationError::DuplicateName(name));
        }

        let mut seen = Vec::with_capacity(definition.aliases.len());
        for alias in &definition.aliases {
            if !is_valid_identifier(alias) || seen.contains(alias) || *alias == name {
                return Err(RegistrationError::InvalidAlias {
                    command: name,
                    alias: alias.clone(),
                });
            }
            if self.by_alias.contains_key(alias) || self.by_name.contains_key(alias) {
                return Err(RegistrationError::DuplicateAlias {
                    command: name,
                    alias: alias.clone(),
                });
            }
            seen.push(alias.clone());
        }

        let category = match definition.category.as_deref() {
            None => CommandCategory::Misc,
            Some(token) => token
                .parse::<CommandCategory>()
                .map_err(|category| RegistrationError::InvalidType {
                    command: name.clone(),
                    category,
                })?,
        };

        let bot_capabilities = match &definition.bot_capabilities {
            None => Command::default_bot_capabilities(),
            Some(tokens) => CapabilitySet::parse(tokens).map_err(|unknown| {
                RegistrationError::InvalidCapabilityToken {
                    command: name.clone(),
                    token: unknown.0,
                }
            })?,
        };
        let user_capabilities = CapabilitySet::parse(&definition.user_capabilities).map_err(
            |unknown| RegistrationError::InvalidCapabilityToken {
                command: name.clone(),
                token: unknown.0,
            },
        )?;

        Ok(Command {
            usage: definition.usage.unwrap_or_else(|| name.clone()),
            name,
            aliases: definition.aliases,
            description: definition.description,
            category,
            cooldown_secs: definition.cooldown_secs,
            bot_capabilities,
            user_capabilities,
            examples: definition.examples,
            owner_only: definition.owner_only,
            handler: definition.handler,
        })
    }

    /// Bulk load. Disabled definitions are skipped, invalid ones are logged
    /// and skipped. Returns how many commands were registered.
    pub fn load(&mut self, definitions: impl IntoIterator<Item = CommandDefinition>) -> usize {
        tracing::info!("Loading commands...");
        let mut loaded = 0;

        for definition in definitions {
            let name = definition.name.clone();
            if definition.disabled {
                tracing::info!(command = %name, "Skipping disabled command");
                continue;
            }

            match self.register(definition) {
                Ok(command) => {
                    loaded += 1;
                    tracing::info!(
                        command = %command.name,
                        aliases = ?command.aliases,
                        category = command.category.token(),
                        "Loaded command"
                    );
                }
                Err(err) => {
                    tracing::error!(command = %name, error = %err, "Failed to load command");
                }
            }
        }

        if loaded == 0 {
            tracing::warn!("No commands found");
        } else {
            tracing::info!("Loaded {} command(s)", loaded);
        }
        loaded
    }

    /// Look up a command by exact name or alias. Callers lowercase the token.
    pub fn resolve(&self, token: &str) -> Option<Arc<Command>> {
        self.by_name
            .get(token)
            .or_else(|| self.by_alias.get(token))
            .cloned()
    }

    /// Commands in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.commands.iter()
    }

    pub fn in_category(&self, category: CommandCategory) -> Vec<Arc<Command>> {
        self.commands
            .iter()
            .filter(|c| c.category == category)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::capabilities::Capability;
    use crate::core::commands::handler::{CommandContext, CommandError, CommandHandler};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn run(&self, _: CommandContext, _: Vec<String>) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn def(name: &str) -> CommandDefinition {
        CommandDefinition::new(name, Arc::new(Noop))
    }

    #[test]
    fn resolves_by_name_and_alias() {
        let mut registry = CommandRegistry::new();
        registry.register(def("warns").aliases(&["warnings", "ws"])).unwrap();

        assert_eq!(registry.resolve("warns").unwrap().name, "warns");
        assert_eq!(registry.resolve("ws").unwrap().name, "warns");
        assert!(registry.resolve("WARNS").is_none());
        assert!(registry.resolve("warn").is_none());
    }

    #[test]
    fn overlapping_alias_fails_and_keeps_first_command() {
        let mut registry = CommandRegistry::new();
        registry.register(def("ping").aliases(&["pong", "latency"])).unwrap();

        let err = registry.register(def("status").aliases(&["latency"])).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateAlias {
                command: "status".into(),
                alias: "latency".into()
            }
        );

        assert_eq!(registry.resolve("latency").unwrap().name, "ping");
        assert_eq!(registry.resolve("pong").unwrap().name, "ping");
        assert!(registry.resolve("status").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn alias_cannot_shadow_a_command_name_and_vice_versa() {
        let mut registry = CommandRegistry::new();
        registry.register(def("help").aliases(&["h"])).unwrap();

        assert!(matches!(
            registry.register(def("commands").aliases(&["help"])),
            Err(RegistrationError::DuplicateAlias { .. })
        ));
        assert_eq!(
            registry.register(def("h")).unwrap_err(),
            RegistrationError::DuplicateName("h".into())
        );
    }

    #[test]
    fn rejects_bad_shapes() {
        let mut registry = CommandRegistry::new();

        assert_eq!(
            registry.register(def("Ping")).unwrap_err(),
            RegistrationError::InvalidName("Ping".into())
        );
        assert_eq!(
            registry.register(def("")).unwrap_err(),
            RegistrationError::InvalidName("".into())
        );
        assert!(matches!(
            registry.register(def("ping").aliases(&["P"])),
            Err(RegistrationError::InvalidAlias { .. })
        ));
        assert!(matches!(
            registry.register(def("ping").category("moderation")),
            Err(RegistrationError::InvalidType { .. })
        ));
        assert_eq!(
            registry
                .register(def("ping").user_capabilities(&["MANAGE_ROLES", "BE_COOL"]))
                .unwrap_err(),
            RegistrationError::InvalidCapabilityToken {
                command: "ping".into(),
                token: "BE_COOL".into()
            }
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn defaults_are_applied() {
        let mut registry = CommandRegistry::new();
        let command = registry.register(def("ping")).unwrap();

        assert_eq!(command.usage, "ping");
        assert_eq!(command.category, CommandCategory::Misc);
        assert_eq!(command.cooldown_secs, 0);
        assert!(command.bot_capabilities.contains(Capability::SendMessages));
        assert!(command.bot_capabilities.contains(Capability::EmbedLinks));
        assert!(command.user_capabilities.is_empty());
    }

    #[test]
    fn load_skips_bad_and_disabled_definitions() {
        let mut registry = CommandRegistry::new();
        let loaded = registry.load(vec![
            def("ping").aliases(&["p"]),
            def("pong").aliases(&["p"]),
            def("hidden").disabled(),
            def("warn").category("mod"),
        ]);

        assert_eq!(loaded, 2);
        let names: Vec<_> = registry.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["ping", "warn"]);
        assert_eq!(registry.in_category(CommandCategory::Mod).len(), 1);
        assert!(registry.resolve("hidden").is_none());
    }
}
