// Mod commands: warnings and timed mutes.

use super::signed;
use crate::core::commands::{CommandContext, CommandDefinition, CommandError, CommandHandler};
use crate::core::gateway::{user_mention, MemberInfo, Reply, Tone};
use crate::core::moderation::{
    ensure_actionable, format_compact, format_long, parse_duration, reason_from_args,
    resolve_member, ModAction, ModLogEntry, MuteExpiry, MAX_MUTE_DURATION,
};
use crate::core::pagination::{ReactionMenu, WindowCursor};
use crate::core::scheduler::{ActionKind, DeferredTarget};
use crate::core::store::WarnRecord;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const WARNS_PER_PAGE: usize = 5;
const WARNS_MENU_TIMEOUT: Duration = Duration::from_secs(180);
const BAD_TIME: &str = "Please enter a length of time of 14 days or less (1s/m/h/d)";
const ROLE_HIERARCHY: &str = "Please check the role hierarchy";

pub fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new("warn", Arc::new(Warn))
            .usage("warn <user mention/ID> [reason]")
            .description("Warns a member in your server.")
            .category("mod")
            .bot_capabilities(&["SEND_MESSAGES", "EMBED_LINKS", "KICK_MEMBERS"])
            .user_capabilities(&["KICK_MEMBERS"])
            .examples(&["warn @Nettles"]),
        CommandDefinition::new("warns", Arc::new(Warns))
            .aliases(&["warnings"])
            .usage("warns <user mention/ID>")
            .description(
                "Displays a member's current warnings. A max of 5 warnings can be displayed at one time.",
            )
            .category("mod")
            .user_capabilities(&["KICK_MEMBERS"])
            .examples(&["warns @Nettles"]),
        CommandDefinition::new("clearwarns", Arc::new(ClearWarns))
            .usage("clearwarns <user mention/ID> [reason]")
            .description("Clears all the warns of the provided member.")
            .category("mod")
            .user_capabilities(&["KICK_MEMBERS"])
            .examples(&["clearwarns @Nettles"]),
        CommandDefinition::new("mute", Arc::new(Mute))
            .usage("mute <user mention/ID> <time> [reason]")
            .description("Mutes a user for the specified amount of time (max is 14 days).")
            .category("mod")
            .bot_capabilities(&["SEND_MESSAGES", "EMBED_LINKS", "MANAGE_ROLES"])
            .user_capabilities(&["MANAGE_ROLES"])
            .examples(&["mute @Nettles 10s", "mute @Nettles 30m talks too much"]),
        CommandDefinition::new("unmute", Arc::new(Unmute))
            .usage("unmute <user mention/ID> [reason]")
            .description("Unmutes the specified user.")
            .category("mod")
            .bot_capabilities(&["SEND_MESSAGES", "EMBED_LINKS", "MANAGE_ROLES"])
            .user_capabilities(&["MANAGE_ROLES"])
            .examples(&["unmute @Nettles"]),
    ]
}

/// The action card every mod command replies with.
fn action_reply(title: &str, description: String, ctx: &CommandContext, member: &MemberInfo) -> Reply {
    Reply::new(title)
        .description(description)
        .field("Moderator", user_mention(ctx.author_id()), true)
        .field("Member", member.mention(), true)
        .tone(Tone::Success)
}

fn mute_role(ctx: &CommandContext) -> Result<u64, CommandError> {
    ctx.services
        .config
        .get(ctx.guild_id)
        .and_then(|config| config.mute_role_id)
        .ok_or_else(|| {
            CommandError::failure("There is currently no mute role set on this server", None)
        })
}

// ============================================================================
// WARNINGS
// ============================================================================

struct Warn;

#[async_trait]
impl CommandHandler for Warn {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let member = resolve_member(&ctx, args.first().map(String::as_str)).await?;
        ensure_actionable(&ctx, &member, "warn")?;
        let reason = reason_from_args(args.get(1..).unwrap_or_default());

        let record = WarnRecord {
            moderator_id: ctx.author_id(),
            issued_at: Utc::now(),
            reason: reason.clone(),
        };
        let count = ctx
            .services
            .warns
            .add_warn(ctx.guild_id, member.user_id, record)
            .await?;

        let reply = action_reply("Warn Member", format!("{} has been warned.", member.mention()), &ctx, &member)
            .field("Warn Count", format!("`{}`", count), true)
            .field("Reason", reason.clone(), false);
        ctx.reply(signed(reply, &ctx)).await?;

        tracing::info!(
            guild_id = ctx.guild_id,
            moderator_id = ctx.author_id(),
            user_id = member.user_id,
            count,
            "Member warned"
        );

        let entry = ModLogEntry::new(ModAction::Warn, ctx.author_id(), member.user_id, reason)
            .extra("Warn Count", format!("`{}`", count));
        ctx.services
            .modlog
            .publish(ctx.gateway.as_ref(), ctx.guild_id, &entry)
            .await;
        Ok(())
    }
}

struct Warns;

/// One page of a member's warn list.
fn warn_page(member: &MemberInfo, warns: &[WarnRecord], cursor: &WindowCursor) -> Reply {
    let range = cursor.range();
    let mut reply = Reply::new(format!("Warn List {}", cursor.range_label()))
        .description(format!(
            "Showing `{}` of {}'s `{}` total warns.",
            range.len(),
            member.mention(),
            warns.len()
        ))
        .author(member.display_name.clone(), member.avatar_url.clone())
        .tone(Tone::Info);

    for (offset, warn) in warns[range.clone()].iter().enumerate() {
        reply = reply
            .field("\u{200b}", format!("**Warn `#{}`**", range.start + offset + 1), false)
            .field("Reason", warn.reason.clone(), false)
            .field("Moderator", user_mention(warn.moderator_id), true)
            .field("Date Issued", warn.display_date(), true);
    }
    reply
}

#[async_trait]
impl CommandHandler for Warns {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let member = resolve_member(&ctx, args.first().map(String::as_str)).await?;
        let warns = ctx
            .services
            .warns
            .list_warns(ctx.guild_id, member.user_id)
            .await?;

        if warns.is_empty() {
            let reply = Reply::new("Warn List [0]")
                .description(format!("{} currently has no warns.", member.mention()))
                .author(member.display_name.clone(), member.avatar_url.clone())
                .tone(Tone::Info);
            ctx.reply(signed(reply, &ctx)).await?;
            return Ok(());
        }

        if warns.len() <= WARNS_PER_PAGE {
            let cursor = WindowCursor::new(warns.len(), WARNS_PER_PAGE);
            ctx.reply(signed(warn_page(&member, &warns, &cursor), &ctx)).await?;
            return Ok(());
        }

        let footer = format!("Expires after three minutes.\n{}", ctx.message.author_name);
        let total = warns.len();
        ReactionMenu::windowed(total, WARNS_PER_PAGE, move |cursor| {
            warn_page(&member, &warns, cursor).footer(footer.clone())
        })
        .timeout(WARNS_MENU_TIMEOUT)
        .start(Arc::clone(&ctx.gateway), ctx.channel_id(), ctx.author_id())
        .await?;
        Ok(())
    }
}

struct ClearWarns;

#[async_trait]
impl CommandHandler for ClearWarns {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let member = resolve_member(&ctx, args.first().map(String::as_str)).await?;
        if member.user_id == ctx.author_id() {
            return Err(CommandError::invalid("You cannot clear your own warns"));
        }
        ensure_actionable(&ctx, &member, "clear the warns of")?;
        let reason = reason_from_args(args.get(1..).unwrap_or_default());

        let removed = ctx
            .services
            .warns
            .clear_warns(ctx.guild_id, member.user_id)
            .await?;

        let reply = action_reply(
            "Clear Warns",
            format!("{}'s warns have been successfully cleared.", member.mention()),
            &ctx,
            &member,
        )
        .field("Warn Count", "`0`", true)
        .field("Reason", reason.clone(), false);
        ctx.reply(signed(reply, &ctx)).await?;

        tracing::info!(
            guild_id = ctx.guild_id,
            moderator_id = ctx.author_id(),
            user_id = member.user_id,
            removed,
            "Warns cleared"
        );

        let entry = ModLogEntry::new(ModAction::ClearWarns, ctx.author_id(), member.user_id, reason)
            .extra("Warn Count", "`0`");
        ctx.services
            .modlog
            .publish(ctx.gateway.as_ref(), ctx.guild_id, &entry)
            .await;
        Ok(())
    }
}

// ============================================================================
// MUTES
// ============================================================================

struct Mute;

#[async_trait]
impl CommandHandler for Mute {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let role_id = mute_role(&ctx)?;
        let member = resolve_member(&ctx, args.first().map(String::as_str)).await?;
        ensure_actionable(&ctx, &member, "mute")?;

        let (duration, rest) = mute_duration(&args)?;

        if member.has_role(role_id) {
            return Err(CommandError::invalid("Provided member is already muted"));
        }
        let reason = reason_from_args(args.get(rest..).unwrap_or_default());

        // The role was taken off by hand since the last mute; that timer is stale
        let target = DeferredTarget {
            guild_id: ctx.guild_id,
            user_id: member.user_id,
        };
        ctx.services.scheduler.cancel_for(target, ActionKind::Unmute);

        // Timer first, so the role never goes on without a pending expiry
        let expiry = Arc::new(MuteExpiry::from_context(&ctx, role_id));
        let handle = ctx
            .services
            .scheduler
            .schedule(target, ActionKind::Unmute, duration, expiry)
            .map_err(|e| CommandError::failure("Unable to schedule the unmute", Some(e.to_string())))?;

        if let Err(e) = ctx
            .gateway
            .add_role(ctx.guild_id, member.user_id, role_id, &reason)
            .await
        {
            ctx.services.scheduler.cancel(handle);
            return Err(CommandError::failure(ROLE_HIERARCHY, Some(e.to_string())));
        }

        let compact = format!("`{}`", format_compact(duration));
        let reply = action_reply(
            "Mute Member",
            format!(
                "{} has now been muted for **{}**.",
                member.mention(),
                format_long(duration)
            ),
            &ctx,
            &member,
        )
        .field("Time", compact.clone(), true)
        .field("Reason", reason.clone(), false);
        ctx.reply(signed(reply, &ctx)).await?;

        tracing::info!(
            guild_id = ctx.guild_id,
            moderator_id = ctx.author_id(),
            user_id = member.user_id,
            secs = duration.as_secs(),
            "Member muted"
        );

        let entry = ModLogEntry::new(ModAction::Mute, ctx.author_id(), member.user_id, reason)
            .extra("Time", compact);
        ctx.services
            .modlog
            .publish(ctx.gateway.as_ref(), ctx.guild_id, &entry)
            .await;
        Ok(())
    }
}

/// Read the mute length from `args[1]`, or from `args[1..3]` for verbose
/// forms like `30 minutes`. Returns the duration and where the reason starts.
fn mute_duration(args: &[String]) -> Result<(Duration, usize), CommandError> {
    let valid = |d: &Duration| !d.is_zero() && *d <= MAX_MUTE_DURATION;

    let first = args.get(1).ok_or_else(|| CommandError::missing(BAD_TIME))?;
    if let Some(duration) = parse_duration(first) {
        return if valid(&duration) {
            Ok((duration, 2))
        } else {
            Err(CommandError::invalid(BAD_TIME))
        };
    }

    args.get(1..3)
        .and_then(|words| parse_duration(&words.join(" ")))
        .filter(valid)
        .map(|duration| (duration, 3))
        .ok_or_else(|| CommandError::invalid(BAD_TIME))
}

struct Unmute;

#[async_trait]
impl CommandHandler for Unmute {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let role_id = mute_role(&ctx)?;
        let member = resolve_member(&ctx, args.first().map(String::as_str)).await?;
        ensure_actionable(&ctx, &member, "unmute")?;
        let reason = reason_from_args(args.get(1..).unwrap_or_default());

        if !member.has_role(role_id) {
            return Err(CommandError::invalid("Provided member is not muted"));
        }

        ctx.gateway
            .remove_role(ctx.guild_id, member.user_id, role_id, &reason)
            .await
            .map_err(|e| CommandError::failure(ROLE_HIERARCHY, Some(e.to_string())))?;

        // Only once the role is gone; a failed removal keeps the expiry armed
        ctx.services.scheduler.cancel_for(
            DeferredTarget {
                guild_id: ctx.guild_id,
                user_id: member.user_id,
            },
            ActionKind::Unmute,
        );

        let reply = Reply::new("Unmute Member")
            .description(format!("{} has been unmuted.", member.mention()))
            .field("Reason", reason.clone(), false)
            .tone(Tone::Success);
        ctx.reply(signed(reply, &ctx)).await?;

        let entry = ModLogEntry::new(ModAction::Unmute, ctx.author_id(), member.user_id, reason);
        ctx.services
            .modlog
            .publish(ctx.gateway.as_ref(), ctx.guild_id, &entry)
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{harness, Harness, CHANNEL, GUILD, MEMBER, MODERATOR, MUTE_ROLE};
    use crate::core::commands::ErrorKind;
    use crate::core::config::ConfigUpdate;
    use crate::core::gateway::Gateway;
    use crate::core::pagination::NEXT;
    use crate::core::scheduler::{ActionKind, DeferredTarget};
    use crate::core::store::WarnStore;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const MEMBER_TARGET: DeferredTarget = DeferredTarget {
        guild_id: GUILD,
        user_id: MEMBER,
    };

    async fn with_mute_role() -> Harness {
        let h = harness().await;
        h.services
            .config
            .update(GUILD, ConfigUpdate::MuteRole(Some(MUTE_ROLE)))
            .await
            .unwrap();
        h
    }

    #[tokio::test]
    async fn warn_records_and_counts() {
        let h = harness().await;
        h.services
            .config
            .update(GUILD, ConfigUpdate::ModLogChannel(Some(CHANNEL)))
            .await
            .unwrap();

        h.run("warn", &["<@30>", "spamming", "links"]).await.unwrap();
        h.run("warn", &["30"]).await.unwrap();

        let warns = h.store.list_warns(GUILD, MEMBER).await.unwrap();
        assert_eq!(warns.len(), 2);
        assert_eq!(warns[0].reason, "spamming links");
        assert_eq!(warns[0].moderator_id, MODERATOR);
        assert_eq!(warns[1].reason, "`None`");

        // Reply then mod log entry, per warn
        let titles = h.gateway.sent_titles();
        assert_eq!(
            titles,
            vec!["Warn Member", "Action: `Warn`", "Warn Member", "Action: `Warn`"]
        );
        let sent = h.gateway.sent();
        assert_eq!(sent[2].1.field_value("Warn Count"), Some("`2`"));
        assert_eq!(sent[3].1.field_value("Warn Count"), Some("`2`"));
    }

    #[tokio::test]
    async fn warn_refuses_self_and_higher_roles() {
        let h = harness().await;

        let err = h.run("warn", &["<@20>"]).await.unwrap_err();
        assert_eq!(err.detail(), "You cannot warn yourself");

        let err = h.run_as(MEMBER, "warn", &["<@20>"]).await.unwrap_err();
        assert_eq!(
            err.detail(),
            "You cannot warn someone with an equal or higher role"
        );

        let err = h.run("warn", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArgument);
        assert!(h.store.list_warns(GUILD, MEMBER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn warns_lists_small_sets_inline() {
        let h = harness().await;

        h.run("warns", &["<@30>"]).await.unwrap();
        let empty = h.last_reply();
        assert_eq!(empty.title.as_deref(), Some("Warn List [0]"));

        for _ in 0..3 {
            h.run("warn", &["<@30>", "rude"]).await.unwrap();
        }
        h.run("warnings", &["<@30>"]).await.unwrap();
        let listed = h.last_reply();
        assert_eq!(listed.title.as_deref(), Some("Warn List [1 - 3]"));
        assert_eq!(
            listed.description.as_deref(),
            Some("Showing `3` of <@30>'s `3` total warns.")
        );
        assert!(h.gateway.added_reactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn warns_pages_large_sets() {
        let h = harness().await;
        for _ in 0..7 {
            h.run("warn", &["<@30>"]).await.unwrap();
        }

        h.run("warns", &["<@30>"]).await.unwrap();
        let (_, first) = h.gateway.sent().pop().unwrap();
        assert_eq!(first.title.as_deref(), Some("Warn List [1 - 5]"));
        assert_eq!(
            first.footer.as_deref(),
            Some("Expires after three minutes.\nmoderator")
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        let handle = h.gateway.added_reactions()[0].0;
        h.gateway.react(handle, MODERATOR, NEXT).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (_, page) = h.gateway.edits().pop().unwrap();
        assert_eq!(page.title.as_deref(), Some("Warn List [6 - 7]"));
        assert_eq!(page.field_value("\u{200b}"), Some("**Warn `#6`**"));
    }

    #[tokio::test]
    async fn clearwarns_empties_the_list() {
        let h = harness().await;
        h.run("warn", &["<@30>"]).await.unwrap();

        let err = h.run("clearwarns", &["<@20>"]).await.unwrap_err();
        assert_eq!(err.detail(), "You cannot clear your own warns");

        h.run("clearwarns", &["<@30>", "fresh", "start"]).await.unwrap();
        assert!(h.store.list_warns(GUILD, MEMBER).await.unwrap().is_empty());
        let reply = h.last_reply();
        assert_eq!(reply.field_value("Warn Count"), Some("`0`"));
        assert_eq!(reply.field_value("Reason"), Some("fresh start"));
    }

    #[tokio::test]
    async fn mute_needs_a_mute_role() {
        let h = harness().await;
        let err = h.run("mute", &["<@30>", "10m"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailure);
        assert_eq!(
            err.detail(),
            "There is currently no mute role set on this server"
        );
    }

    #[tokio::test]
    async fn mute_validates_time() {
        let h = with_mute_role().await;

        let err = h.run("mute", &["<@30>"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArgument);

        for bad in ["15d", "0s", "soon"] {
            let err = h.run("mute", &["<@30>", bad]).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{}", bad);
        }
        assert!(h.gateway.role_log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn mute_adds_role_and_expires() {
        let h = with_mute_role().await;

        h.run("mute", &["<@30>", "10m", "talks", "too", "much"])
            .await
            .unwrap();
        assert_eq!(h.gateway.member_roles(GUILD, MEMBER), vec![MUTE_ROLE]);
        assert!(h.services.scheduler.is_pending(MEMBER_TARGET, ActionKind::Unmute));

        let reply = h.last_reply();
        assert_eq!(
            reply.description.as_deref(),
            Some("<@30> has now been muted for **10 minutes**.")
        );
        assert_eq!(reply.field_value("Time"), Some("`10m`"));

        let err = h.run("mute", &["<@30>", "5m"]).await.unwrap_err();
        assert_eq!(err.detail(), "Provided member is already muted");

        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(h.gateway.member_roles(GUILD, MEMBER).is_empty());
        assert!(!h.services.scheduler.is_pending(MEMBER_TARGET, ActionKind::Unmute));
        assert_eq!(h.last_reply().title.as_deref(), Some("Unmute Member"));
    }

    #[tokio::test]
    async fn mute_reports_role_failures() {
        let h = with_mute_role().await;
        h.gateway.fail_role_changes.store(true, Ordering::SeqCst);

        let err = h.run("mute", &["<@30>", "1h"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailure);
        assert_eq!(err.detail(), "Please check the role hierarchy");
        assert!(!h.services.scheduler.is_pending(MEMBER_TARGET, ActionKind::Unmute));
        assert!(h.services.scheduler.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn mute_accepts_verbose_lengths() {
        let h = with_mute_role().await;

        h.run("mute", &["<@30>", "30", "minutes", "too", "loud"])
            .await
            .unwrap();
        let reply = h.last_reply();
        assert_eq!(
            reply.description.as_deref(),
            Some("<@30> has now been muted for **30 minutes**.")
        );
        assert_eq!(reply.field_value("Reason"), Some("too loud"));
        let remaining = h
            .services
            .scheduler
            .remaining(MEMBER_TARGET, ActionKind::Unmute)
            .unwrap();
        assert_eq!(remaining, Duration::from_secs(1800));

        let err = h.run("mute", &["<@30>", "3", "fortnights"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_unmute_keeps_the_expiry() {
        let h = with_mute_role().await;
        h.run("mute", &["<@30>", "10m"]).await.unwrap();

        h.gateway.fail_role_changes.store(true, Ordering::SeqCst);
        let err = h.run("unmute", &["<@30>"]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailure);
        assert_eq!(h.gateway.member_roles(GUILD, MEMBER), vec![MUTE_ROLE]);
        assert!(h.services.scheduler.is_pending(MEMBER_TARGET, ActionKind::Unmute));

        h.gateway.fail_role_changes.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(h.gateway.member_roles(GUILD, MEMBER).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unmute_cancels_the_pending_expiry() {
        let h = with_mute_role().await;

        let err = h.run("unmute", &["<@30>"]).await.unwrap_err();
        assert_eq!(err.detail(), "Provided member is not muted");

        h.run("mute", &["<@30>", "1h"]).await.unwrap();
        h.run("unmute", &["<@30>", "served", "time"]).await.unwrap();

        assert!(h.gateway.member_roles(GUILD, MEMBER).is_empty());
        assert!(!h.services.scheduler.is_pending(MEMBER_TARGET, ActionKind::Unmute));
        assert_eq!(h.last_reply().field_value("Reason"), Some("served time"));

        // Nothing fires later
        let sent_before = h.gateway.sent().len();
        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert_eq!(h.gateway.sent().len(), sent_before);
    }

    #[tokio::test(start_paused = true)]
    async fn remute_after_manual_role_removal_replaces_the_timer() {
        let h = with_mute_role().await;
        h.run("mute", &["<@30>", "1h"]).await.unwrap();

        // Role taken off outside the bot
        h.gateway
            .remove_role(GUILD, MEMBER, MUTE_ROLE, "manual")
            .await
            .unwrap();

        h.run("mute", &["<@30>", "10m"]).await.unwrap();
        let remaining = h
            .services
            .scheduler
            .remaining(MEMBER_TARGET, ActionKind::Unmute)
            .unwrap();
        assert!(remaining <= Duration::from_secs(600));
    }
}
