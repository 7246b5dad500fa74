// Built-in commands.
// Each command family gets its own file; `builtin_commands` hands the whole
// set to the registry at startup.

use crate::core::commands::{CommandContext, CommandDefinition};
use crate::core::gateway::Reply;

pub mod admin;
pub mod info;
pub mod moderation;
pub mod owner;

#[cfg(test)]
pub mod test_support;

/// Every built-in definition, in the order `help` lists them.
pub fn builtin_commands() -> Vec<CommandDefinition> {
    let mut definitions = Vec::new();
    definitions.extend(info::definitions());
    definitions.extend(admin::definitions());
    definitions.extend(moderation::definitions());
    definitions.extend(owner::definitions());
    definitions
}

/// Sign a reply with the invoker's name, the way every command card is.
pub fn signed(reply: Reply, ctx: &CommandContext) -> Reply {
    let footer = match &reply.footer {
        Some(existing) => format!("{}\n{}", existing, ctx.message.author_name),
        None => ctx.message.author_name.clone(),
    };
    reply.footer(footer)
}

/// Shown for unset settings.
pub const NONE: &str = "`None`";

/// Render an optional id as a mention, or `None`.
pub fn mention_or_none(id: Option<u64>, mention: fn(u64) -> String) -> String {
    id.map(mention).unwrap_or_else(|| NONE.to_string())
}
