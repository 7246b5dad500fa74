// Mod log publisher - posts moderation actions to the guild's mod log channel.

use super::moderation_models::ModLogEntry;
use crate::core::config::ConfigService;
use crate::core::gateway::{user_mention, Gateway, Reply, Tone};
use std::sync::Arc;

pub struct ModerationLogPublisher {
    config: Arc<ConfigService>,
}

impl ModerationLogPublisher {
    pub fn new(config: Arc<ConfigService>) -> Self {
        Self { config }
    }

    /// Post the entry. Returns whether a message went out.
    ///
    /// Guilds without a mod log channel, or whose channel the bot can't post
    /// in, are skipped. Failed sends are logged and not retried.
    pub async fn publish(&self, gateway: &dyn Gateway, guild_id: u64, entry: &ModLogEntry) -> bool {
        let channel_id = match self.config.get(guild_id).and_then(|c| c.mod_log_channel_id) {
            Some(id) => id,
            None => return false,
        };

        if !gateway.channel_accessible(guild_id, channel_id) {
            tracing::debug!(guild_id, channel_id, "Mod log channel not accessible, skipping");
            return false;
        }

        match gateway.send(channel_id, modlog_reply(entry)).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    guild_id,
                    channel_id,
                    action = %entry.action,
                    "Failed to post mod log entry: {}",
                    e
                );
                false
            }
        }
    }
}

pub fn modlog_reply(entry: &ModLogEntry) -> Reply {
    let mut reply = Reply::new(format!("Action: `{}`", entry.action))
        .field("Moderator", user_mention(entry.moderator_id), true)
        .field("Member", user_mention(entry.member_id), true)
        .tone(Tone::Warning);

    for (name, value) in &entry.extra {
        reply = reply.field(name.clone(), value.clone(), true);
    }

    reply.field("Reason", entry.reason.clone(), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::capabilities::{Capability, CapabilitySet};
    use crate::core::config::ConfigUpdate;
    use crate::core::gateway::mock::{MockGateway, BOT_ID};
    use crate::core::moderation::ModAction;
    use crate::infra::memory::InMemoryGuildStore;

    async fn publisher_with_channel(channel: Option<u64>) -> ModerationLogPublisher {
        let config = Arc::new(ConfigService::new(Arc::new(InMemoryGuildStore::new()), "!!"));
        config.ensure_guild(1, None).await.unwrap();
        config
            .update(1, ConfigUpdate::ModLogChannel(channel))
            .await
            .unwrap();
        ModerationLogPublisher::new(config)
    }

    #[tokio::test]
    async fn posts_entry_to_configured_channel() {
        let publisher = publisher_with_channel(Some(50)).await;
        let gateway = MockGateway::new();
        gateway.grant(BOT_ID, CapabilitySet::from([Capability::Administrator]));

        let entry = ModLogEntry::new(ModAction::Mute, 10, 20, "spamming").extra("Time", "`10m`");
        assert!(publisher.publish(&gateway, 1, &entry).await);

        let sent = gateway.sent();
        assert_eq!(sent.len(), 1);
        let (channel, reply) = &sent[0];
        assert_eq!(*channel, 50);
        assert_eq!(reply.title.as_deref(), Some("Action: `Mute`"));
        assert_eq!(reply.field_value("Moderator"), Some("<@10>"));
        assert_eq!(reply.field_value("Member"), Some("<@20>"));
        assert_eq!(reply.field_value("Time"), Some("`10m`"));
        assert_eq!(reply.field_value("Reason"), Some("spamming"));
    }

    #[tokio::test]
    async fn skips_when_unset_or_inaccessible() {
        let gateway = MockGateway::new();
        let entry = ModLogEntry::new(ModAction::Warn, 10, 20, "`None`");

        let unset = publisher_with_channel(None).await;
        assert!(!unset.publish(&gateway, 1, &entry).await);

        // Channel set but the bot holds nothing there
        let blocked = publisher_with_channel(Some(50)).await;
        assert!(!blocked.publish(&gateway, 1, &entry).await);

        assert!(gateway.sent().is_empty());
    }
}
