// Owner-only commands.

use super::signed;
use crate::core::commands::{CommandContext, CommandDefinition, CommandError, CommandHandler};
use crate::core::gateway::{Reply, Tone};
use crate::core::pagination::{ReactionMenu, WindowCursor, DEFAULT_WINDOW};
use async_trait::async_trait;
use std::sync::Arc;

pub fn definitions() -> Vec<CommandDefinition> {
    vec![CommandDefinition::new("servers", Arc::new(Servers))
        .aliases(&["servs"])
        .usage("servers")
        .description("Displays a list of the bot's joined servers.")
        .category("owner")
        .owner_only()]
}

struct Servers;

#[async_trait]
impl CommandHandler for Servers {
    async fn run(&self, ctx: CommandContext, _args: Vec<String>) -> Result<(), CommandError> {
        let mut guild_ids = ctx.services.config.guild_ids();
        guild_ids.sort_unstable();

        let mut lines = Vec::with_capacity(guild_ids.len());
        for guild_id in guild_ids {
            let name = ctx
                .gateway
                .guild_name(guild_id)
                .unwrap_or_else(|| "Unknown".to_string());
            let members = ctx.services.members.list_members(guild_id).await?.len();
            lines.push(format!("`{}` - **{}** - `{}` members", guild_id, name, members));
        }

        let template = signed(Reply::new("Server List").tone(Tone::Info), &ctx);
        if lines.len() <= DEFAULT_WINDOW {
            let range = WindowCursor::new(lines.len(), DEFAULT_WINDOW).range_label();
            let reply = template
                .with_title_suffix(&format!(" {}", range))
                .description(lines.join("\n"));
            ctx.reply(reply).await?;
            return Ok(());
        }

        ReactionMenu::list(template, lines, DEFAULT_WINDOW)
            .start(Arc::clone(&ctx.gateway), ctx.channel_id(), ctx.author_id())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{harness, GUILD, OWNER};
    use crate::core::store::{MembershipRecord, MembershipStore};
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn lists_joined_servers() {
        let h = harness().await;
        h.gateway.set_guild_name(GUILD, "Nettle Patch");
        h.services.config.ensure_guild(2, None).await.unwrap();
        for user_id in [30, 31] {
            h.store
                .add_member(MembershipRecord {
                    guild_id: GUILD,
                    user_id,
                    display_name: format!("user{}", user_id),
                    joined_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        h.run_as(OWNER, "servs", &[]).await.unwrap();
        let reply = h.last_reply();
        assert_eq!(reply.title.as_deref(), Some("Server List [1 - 2]"));
        assert_eq!(
            reply.description.as_deref(),
            Some("`1` - **Nettle Patch** - `2` members\n`2` - **Unknown** - `0` members")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn long_lists_become_a_menu() {
        let h = harness().await;
        for guild_id in 2..=12 {
            h.services.config.ensure_guild(guild_id, None).await.unwrap();
        }

        h.run_as(OWNER, "servers", &[]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            h.last_reply().title.as_deref(),
            Some("Server List [1 - 10]")
        );
        assert_eq!(h.gateway.added_reactions().len(), 5);
    }
}
