// Info commands: ping, help, aliases and prefix.

use super::signed;
use crate::core::commands::{
    Command, CommandCategory, CommandContext, CommandDefinition, CommandError, CommandHandler,
};
use crate::core::gateway::{Reply, Tone};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

pub fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new("ping", Arc::new(Ping))
            .description("Gets the bot's current latency.")
            .category("info")
            .cooldown(5),
        CommandDefinition::new("help", Arc::new(Help))
            .aliases(&["commands", "h"])
            .usage("help [command | all]")
            .description(
                "Displays a list of all current commands, sorted by category. \
                 Can be used with a command for more information. \
                 Only lists commands you can use unless `all` is given.",
            )
            .category("info")
            .examples(&["help ping", "help all"]),
        CommandDefinition::new("aliases", Arc::new(Aliases))
            .aliases(&["alias", "ali", "a"])
            .usage("aliases [command type]")
            .description(
                "Displays the aliases of every command of the given type. \
                 Without a type, shows how many aliases each type has.",
            )
            .category("info")
            .examples(&["aliases info"]),
        CommandDefinition::new("prefix", Arc::new(Prefix))
            .aliases(&["pre"])
            .description("Fetches the bot's current prefix.")
            .category("info"),
    ]
}

// ============================================================================
// PING
// ============================================================================

struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    async fn run(&self, ctx: CommandContext, _args: Vec<String>) -> Result<(), CommandError> {
        let started = Instant::now();
        let handle = ctx
            .reply(Reply::default().description("`Pinging...`").tone(Tone::Info))
            .await?;
        let latency = started.elapsed().as_millis();

        let reply = Reply::new("Pong!")
            .field("Latency", format!("```ini\n[ {}ms ]```", latency), true)
            .tone(Tone::Info);
        ctx.gateway.edit(handle, signed(reply, &ctx)).await?;
        Ok(())
    }
}

// ============================================================================
// HELP
// ============================================================================

struct Help;

impl Help {
    fn command_detail(ctx: &CommandContext, command: &Command) -> Reply {
        let mut reply = Reply::new(format!("Command: `{}`", command.name))
            .description(command.description.clone())
            .field("Usage", format!("`{}{}`", ctx.prefix, command.usage), true)
            .field("Type", format!("`{}`", command.category), true)
            .tone(Tone::Info);

        if !command.aliases.is_empty() {
            let aliases = command
                .aliases
                .iter()
                .map(|a| format!("`{}`", a))
                .collect::<Vec<_>>()
                .join(" ");
            reply = reply.field("Aliases", aliases, false);
        }
        if !command.examples.is_empty() {
            let examples = command
                .examples
                .iter()
                .map(|e| format!("`{}{}`", ctx.prefix, e))
                .collect::<Vec<_>>()
                .join("\n");
            reply = reply.field("Examples", examples, false);
        }
        signed(reply, ctx)
    }

    fn command_list(ctx: &CommandContext, show_all: bool) -> Reply {
        let registry = &ctx.services.registry;
        let mut reply = Reply::new(format!("{}'s Commands", ctx.gateway.bot_name())).tone(Tone::Info);
        let mut hidden = false;

        for category in CommandCategory::ALL {
            if category == CommandCategory::Owner && !ctx.is_owner() {
                continue;
            }

            let names: Vec<String> = registry
                .in_category(category)
                .iter()
                .filter(|command| {
                    let usable = show_all
                        || ctx.gateway.has_capabilities(
                            ctx.guild_id,
                            ctx.channel_id(),
                            ctx.author_id(),
                            &command.user_capabilities,
                        );
                    hidden |= !usable;
                    usable
                })
                .map(|command| format!("`{}`", command.name))
                .collect();

            if !names.is_empty() {
                reply = reply.field(
                    format!("**{} [{}]**", category.label(), names.len()),
                    names.join(" "),
                    false,
                );
            }
        }

        if hidden {
            reply = reply
                .description(format!("**All Commands:** `{}help all`", ctx.prefix))
                .footer("Only showing available commands.");
        }
        signed(reply, ctx)
    }
}

#[async_trait]
impl CommandHandler for Help {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let token = args.first().map(|a| a.to_lowercase());
        let show_all = token.as_deref() == Some("all");

        let reply = match token.as_deref() {
            None | Some("all") => Self::command_list(&ctx, show_all),
            Some(token) => match ctx.services.registry.resolve(token) {
                Some(command) if command.category != CommandCategory::Owner || ctx.is_owner() => {
                    Self::command_detail(&ctx, &command)
                }
                _ => {
                    return Err(CommandError::invalid(
                        "Unable to find command, please check provided command",
                    ))
                }
            },
        };

        ctx.reply(reply).await?;
        Ok(())
    }
}

// ============================================================================
// ALIASES
// ============================================================================

struct Aliases;

#[async_trait]
impl CommandHandler for Aliases {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let visible = |command: &&Arc<Command>| !command.owner_only || ctx.is_owner();

        let reply = match args.first() {
            Some(token) => {
                let category: CommandCategory = token.to_lowercase().parse().map_err(|_| {
                    CommandError::invalid("Unable to find alias type, please check provided type")
                })?;

                let commands = ctx.services.registry.in_category(category);
                let lines: Vec<String> = commands
                    .iter()
                    .filter(visible)
                    .filter(|command| !command.aliases.is_empty())
                    .map(|command| {
                        let aliases = command
                            .aliases
                            .iter()
                            .map(|a| format!("`{}`", a))
                            .collect::<Vec<_>>()
                            .join(" ");
                        format!("**{}:** {}", command.name, aliases)
                    })
                    .collect();
                let total: usize = commands
                    .iter()
                    .filter(visible)
                    .map(|command| command.aliases.len())
                    .sum();

                let body = if lines.is_empty() {
                    "`None`".to_string()
                } else {
                    lines.join("\n")
                };
                Reply::new(format!("Alias Type: `{}`", category.label()))
                    .field(format!("**[{}]**", total), body, false)
            }
            None => {
                let mut reply = Reply::new("Alias Types").description(format!(
                    "**More Information:** `{}aliases [command type]`",
                    ctx.prefix
                ));
                for category in CommandCategory::ALL {
                    let count: usize = ctx
                        .services
                        .registry
                        .in_category(category)
                        .iter()
                        .filter(visible)
                        .map(|command| command.aliases.len())
                        .sum();
                    if count > 0 {
                        reply = reply.field(
                            format!("**{}**", category.label()),
                            format!("`{}` aliases", count),
                            true,
                        );
                    }
                }
                reply
            }
        };

        ctx.reply(signed(reply.tone(Tone::Info), &ctx)).await?;
        Ok(())
    }
}

// ============================================================================
// PREFIX
// ============================================================================

struct Prefix;

#[async_trait]
impl CommandHandler for Prefix {
    async fn run(&self, ctx: CommandContext, _args: Vec<String>) -> Result<(), CommandError> {
        let reply = Reply::new(format!("{}'s Prefix", ctx.gateway.bot_name()))
            .field("Prefix", format!("`{}`", ctx.prefix), true)
            .field("Example", format!("`{}ping`", ctx.prefix), true)
            .tone(Tone::Info);
        ctx.reply(signed(reply, &ctx)).await?;
        Ok(())
    }
}
