// Timed mutes: the reversal the scheduler runs when a mute expires.

use super::moderation_models::{ModAction, ModLogEntry};
use super::modlog::ModerationLogPublisher;
use crate::core::commands::handler::{CommandContext, CommandError};
use crate::core::commands::replies::{command_error_reply, Attribution};
use crate::core::commands::Command;
use crate::core::config::ConfigService;
use crate::core::gateway::{user_mention, Gateway, Reply, Tone};
use crate::core::scheduler::{DeferredReversal, DeferredTarget};
use async_trait::async_trait;
use std::sync::Arc;

pub const EXPIRED_REASON: &str = "Mute time expired";

/// Removes the mute role once the mute runs out.
///
/// Safe to run after a manual unmute: members who no longer hold the role,
/// or have left, are skipped.
pub struct MuteExpiry {
    gateway: Arc<dyn Gateway>,
    config: Arc<ConfigService>,
    role_id: u64,
    /// Where the mute was issued; the unmute notice and failures go here.
    channel_id: u64,
    command: Arc<Command>,
    prefix: String,
    attribution: Attribution,
}

impl MuteExpiry {
    pub fn from_context(ctx: &CommandContext, role_id: u64) -> Self {
        Self {
            gateway: Arc::clone(&ctx.gateway),
            config: Arc::clone(&ctx.services.config),
            role_id,
            channel_id: ctx.channel_id(),
            command: Arc::clone(&ctx.command),
            prefix: ctx.prefix.clone(),
            attribution: Attribution {
                name: ctx.message.author_name.clone(),
                icon_url: ctx.message.avatar_url.clone(),
            },
        }
    }
}

#[async_trait]
impl DeferredReversal for MuteExpiry {
    async fn run(&self, target: DeferredTarget) -> Result<(), CommandError> {
        let member = match self.gateway.member(target.guild_id, target.user_id).await? {
            Some(member) if member.has_role(self.role_id) => member,
            _ => {
                tracing::debug!(
                    guild_id = target.guild_id,
                    user_id = target.user_id,
                    "Mute already lifted, nothing to undo"
                );
                return Ok(());
            }
        };

        self.gateway
            .remove_role(target.guild_id, member.user_id, self.role_id, EXPIRED_REASON)
            .await
            .map_err(|e| {
                CommandError::failure("Please check the role hierarchy", Some(e.to_string()))
            })?;

        let notice = Reply::new("Unmute Member")
            .description(format!("{} has been unmuted.", member.mention()))
            .tone(Tone::Success);
        if let Err(e) = self.gateway.send(self.channel_id, notice).await {
            tracing::warn!(channel_id = self.channel_id, "Failed to send unmute notice: {}", e);
        }

        let entry = ModLogEntry::new(
            ModAction::Unmute,
            self.gateway.bot_user_id(),
            member.user_id,
            EXPIRED_REASON,
        );
        ModerationLogPublisher::new(Arc::clone(&self.config))
            .publish(self.gateway.as_ref(), target.guild_id, &entry)
            .await;

        tracing::info!(
            guild_id = target.guild_id,
            user = %user_mention(member.user_id),
            "Mute expired"
        );
        Ok(())
    }

    async fn report_failure(&self, _target: DeferredTarget, error: CommandError) {
        let reply = command_error_reply(&self.command, &self.prefix, &error, &self.attribution);
        if let Err(e) = self.gateway.send(self.channel_id, reply).await {
            tracing::warn!(channel_id = self.channel_id, "Failed to report unmute failure: {}", e);
        }
    }
}
