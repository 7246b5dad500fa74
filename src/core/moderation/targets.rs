// Resolving and vetting the member a moderation command acts on.

use super::moderation_models::parse_user_id;
use crate::core::commands::handler::{CommandContext, CommandError};
use crate::core::gateway::MemberInfo;

const BAD_MEMBER: &str = "Please mention a user or provide a valid user ID";

/// Look up the member named by `token` (mention or raw id).
pub async fn resolve_member(
    ctx: &CommandContext,
    token: Option<&str>,
) -> Result<MemberInfo, CommandError> {
    let token = token.ok_or_else(|| CommandError::missing(BAD_MEMBER))?;
    let user_id = parse_user_id(token).ok_or_else(|| CommandError::invalid(BAD_MEMBER))?;

    ctx.gateway
        .member(ctx.guild_id, user_id)
        .await?
        .ok_or_else(|| CommandError::invalid(BAD_MEMBER))
}

/// Refuse to act on the invoker, the bot, or anyone whose top role is not
/// below the invoker's. `verb` goes in the message ("You cannot mute yourself").
pub fn ensure_actionable(
    ctx: &CommandContext,
    target: &MemberInfo,
    verb: &str,
) -> Result<(), CommandError> {
    if target.user_id == ctx.author_id() {
        return Err(CommandError::invalid(format!("You cannot {} yourself", verb)));
    }

    if target.user_id == ctx.gateway.bot_user_id() {
        return Err(CommandError::invalid(format!("You cannot {} me", verb)));
    }

    let target_top = ctx.gateway.highest_role_position(ctx.guild_id, target.user_id);
    let actor_top = ctx.gateway.highest_role_position(ctx.guild_id, ctx.author_id());
    if target_top >= actor_top {
        return Err(CommandError::invalid(format!(
            "You cannot {} someone with an equal or higher role",
            verb
        )));
    }

    Ok(())
}
