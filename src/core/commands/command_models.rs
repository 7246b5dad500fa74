use super::capabilities::{Capability, CapabilitySet};
use super::handler::CommandHandler;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The configured command categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommandCategory {
    Info,
    Fun,
    Color,
    Points,
    Misc,
    Mod,
    Admin,
    Owner,
}

impl CommandCategory {
    pub const ALL: [CommandCategory; 8] = [
        CommandCategory::Info,
        CommandCategory::Fun,
        CommandCategory::Color,
        CommandCategory::Points,
        CommandCategory::Misc,
        CommandCategory::Mod,
        CommandCategory::Admin,
        CommandCategory::Owner,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            CommandCategory::Info => "info",
            CommandCategory::Fun => "fun",
            CommandCategory::Color => "color",
            CommandCategory::Points => "points",
            CommandCategory::Misc => "misc",
            CommandCategory::Mod => "mod",
            CommandCategory::Admin => "admin",
            CommandCategory::Owner => "owner",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CommandCategory::Info => "Info",
            CommandCategory::Fun => "Fun",
            CommandCategory::Color => "Color",
            CommandCategory::Points => "Points",
            CommandCategory::Misc => "Misc",
            CommandCategory::Mod => "Mod",
            CommandCategory::Admin => "Admin",
            CommandCategory::Owner => "Owner",
        }
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CommandCategory {
    type Err = String;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        CommandCategory::ALL
            .iter()
            .copied()
            .find(|category| category.token() == token)
            .ok_or_else(|| token.to_string())
    }
}

/// Raw command options, as written by whoever implements the handler.
///
/// Nothing here is trusted yet: the registry validates a definition and turns
/// it into a `Command`, or logs and skips it.
#[derive(Clone)]
pub struct CommandDefinition {
    pub name: String,
    pub aliases: Vec<String>,
    pub usage: Option<String>,
    pub description: String,
    /// Category token, `misc` when not set.
    pub category: Option<String>,
    pub cooldown_secs: u64,
    /// Capability tokens. `None` means SEND_MESSAGES + EMBED_LINKS.
    pub bot_capabilities: Option<Vec<String>>,
    pub user_capabilities: Vec<String>,
    pub examples: Vec<String>,
    pub owner_only: bool,
    pub disabled: bool,
    pub handler: Arc<dyn CommandHandler>,
}

impl CommandDefinition {
    pub fn new(name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            usage: None,
            description: String::new(),
            category: None,
            cooldown_secs: 0,
            bot_capabilities: None,
            user_capabilities: Vec::new(),
            examples: Vec::new(),
            owner_only: false,
            disabled: false,
            handler,
        }
    }

    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn cooldown(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    pub fn bot_capabilities(mut self, tokens: &[&str]) -> Self {
        self.bot_capabilities = Some(tokens.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn user_capabilities(mut self, tokens: &[&str]) -> Self {
        self.user_capabilities = tokens.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn examples(mut self, examples: &[&str]) -> Self {
        self.examples = examples.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn owner_only(mut self) -> Self {
        self.owner_only = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// A validated, registered command. Immutable once built.
pub struct Command {
    pub name: String,
    pub aliases: Vec<String>,
    pub usage: String,
    pub description: String,
    pub category: CommandCategory,
    pub cooldown_secs: u64,
    pub bot_capabilities: CapabilitySet,
    pub user_capabilities: CapabilitySet,
    pub examples: Vec<String>,
    pub owner_only: bool,
    pub handler: Arc<dyn CommandHandler>,
}

impl Command {
    /// Bot capabilities assumed when a definition doesn't list any.
    pub fn default_bot_capabilities() -> CapabilitySet {
        CapabilitySet::from([Capability::SendMessages, Capability::EmbedLinks])
    }

    pub fn has_cooldown(&self) -> bool {
        self.cooldown_secs > 0
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("category", &self.category)
            .field("cooldown_secs", &self.cooldown_secs)
            .field("bot_capabilities", &self.bot_capabilities)
            .field("user_capabilities", &self.user_capabilities)
            .field("owner_only", &self.owner_only)
            .finish_non_exhaustive()
    }
}
