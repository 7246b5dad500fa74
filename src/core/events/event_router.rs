// Event router - the one place typed gateway events enter the core.
//
// Messages go to the dispatcher; member and guild events drive the config,
// membership rows and activity log.

use crate::core::commands::replies::system_error_reply;
use crate::core::commands::{CommandDispatcher, DispatchOutcome};
use crate::core::gateway::{Gateway, GatewayEvent, InboundMessage, MemberInfo, Reply};
use crate::core::logging::{LogEvent, TrackedMessage};
use crate::core::services::BotServices;
use crate::core::store::MembershipRecord;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

const ROLE_UPDATE: &str = "Role Update";

pub struct EventRouter {
    services: Arc<BotServices>,
    gateway: Arc<dyn Gateway>,
    dispatcher: CommandDispatcher,
}

impl EventRouter {
    pub fn new(services: Arc<BotServices>, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(Arc::clone(&services), Arc::clone(&gateway)),
            services,
            gateway,
        }
    }

    pub async fn handle(&self, event: GatewayEvent) -> Result<()> {
        match event {
            GatewayEvent::MessageCreated(message) => {
                self.on_message(message).await;
            }
            GatewayEvent::MessageEdited {
                guild_id: Some(_),
                message_id,
                new_content: Some(content),
                ..
            } => {
                if let Some(event) = self.services.activity.record_edit(message_id, &content) {
                    self.services.activity.publish(self.gateway.as_ref(), &event).await;
                }
            }
            GatewayEvent::MessageDeleted {
                guild_id: Some(guild_id),
                message_id,
                ..
            } => {
                if let Some(event) = self.services.activity.record_delete(guild_id, message_id) {
                    self.services.activity.publish(self.gateway.as_ref(), &event).await;
                }
            }
            GatewayEvent::MemberJoined(member) => self.on_member_joined(member).await?,
            GatewayEvent::MemberLeft {
                guild_id,
                user_id,
                user_name,
                avatar_url,
                joined_at,
            } => {
                self.services.members.remove_member(guild_id, user_id).await?;
                let event = LogEvent::MemberLeft {
                    guild_id,
                    user_id,
                    user_name,
                    avatar_url,
                    joined_at,
                };
                self.services.activity.publish(self.gateway.as_ref(), &event).await;
            }
            GatewayEvent::MemberUpdated {
                guild_id,
                user_id,
                old_nickname,
                new_nickname,
            } => {
                if old_nickname != new_nickname {
                    let event = LogEvent::NicknameChanged {
                        guild_id,
                        user_id,
                        old_nickname,
                        new_nickname,
                    };
                    self.services.activity.publish(self.gateway.as_ref(), &event).await;
                }
            }
            GatewayEvent::GuildJoined {
                guild_id,
                name,
                system_channel_id,
            } => {
                let created = self
                    .services
                    .config
                    .ensure_guild(guild_id, system_channel_id)
                    .await?;
                tracing::info!(guild_id, guild = %name, created, "Joined guild");
            }
            GatewayEvent::GuildLeft { guild_id } => {
                self.services.config.remove_guild(guild_id).await?;
                self.services.members.remove_guild_members(guild_id).await?;
                self.services.warns.clear_guild_warns(guild_id).await?;
                tracing::info!(guild_id, "Left guild");
            }
            // Reactions are consumed by menu subscriptions
            GatewayEvent::ReactionAdded(_) | GatewayEvent::ReactionRemoved(_) => {}
            // DM edits/deletes, and edits that didn't touch the content
            GatewayEvent::MessageEdited { .. } | GatewayEvent::MessageDeleted { .. } => {}
        }
        Ok(())
    }

    async fn on_message(&self, message: InboundMessage) -> DispatchOutcome {
        if let (Some(guild_id), false) = (message.guild_id, message.author_is_bot) {
            self.services.activity.remember_message(TrackedMessage {
                message_id: message.message_id,
                guild_id,
                channel_id: message.channel_id,
                author_id: message.author_id,
                author_name: message.author_name.clone(),
                content: message.content.clone(),
                attachments: message.attachments.clone(),
                avatar_url: message.avatar_url.clone(),
            });
        }

        self.dispatcher.dispatch(message).await
    }

    async fn on_member_joined(&self, member: MemberInfo) -> Result<()> {
        let guild_id = member.guild_id;

        self.assign_auto_role(&member).await;

        self.services
            .members
            .add_member(MembershipRecord {
                guild_id,
                user_id: member.user_id,
                display_name: member.display_name.clone(),
                joined_at: member.joined_at.unwrap_or_else(Utc::now),
            })
            .await?;

        let event = LogEvent::MemberJoined {
            guild_id,
            user_id: member.user_id,
            user_name: member.display_name,
            avatar_url: member.avatar_url,
            created_at: member.account_created,
        };
        self.services.activity.publish(self.gateway.as_ref(), &event).await;
        Ok(())
    }

    async fn assign_auto_role(&self, member: &MemberInfo) {
        let guild_id = member.guild_id;
        let role_id = match self.services.config.get(guild_id).and_then(|c| c.auto_role_id) {
            Some(id) => id,
            None => return,
        };

        if self.gateway.role_position(guild_id, role_id).is_none() {
            tracing::debug!(guild_id, role_id, "Auto role no longer exists");
            return;
        }
        if member.has_role(role_id) {
            return;
        }

        if let Err(e) = self
            .gateway
            .add_role(guild_id, member.user_id, role_id, "Auto role")
            .await
        {
            tracing::warn!(guild_id, user_id = member.user_id, "Failed to assign auto role: {}", e);
            let reply = system_error_reply(
                "auto role",
                ROLE_UPDATE,
                "Unable to assign auto role, please check the role hierarchy and ensure I have the Manage Roles permission",
                Some(&e.to_string()),
            );
            self.send_system_error(guild_id, reply).await;
        }
    }

    /// Post to the guild's system channel, if it has one we can write to.
    async fn send_system_error(&self, guild_id: u64, reply: Reply) {
        let channel_id = match self.services.config.get(guild_id).and_then(|c| c.system_channel_id) {
            Some(id) => id,
            None => return,
        };
        if !self.gateway.channel_accessible(guild_id, channel_id) {
            return;
        }
        if let Err(e) = self.gateway.send(channel_id, reply).await {
            tracing::warn!(guild_id, channel_id, "Failed to send system error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::capabilities::{Capability, CapabilitySet};
    use crate::core::commands::{CommandRegistry, OwnerSet};
    use crate::core::config::{ConfigService, ConfigUpdate};
    use crate::core::gateway::mock::{MockGateway, BOT_ID};
    use crate::core::store::{GuildConfigStore, MembershipStore, WarnRecord, WarnStore};
    use crate::infra::memory::InMemoryGuildStore;
    use std::sync::atomic::Ordering;

    const GUILD: u64 = 1;
    const SYSTEM: u64 = 5;
    const MEMBER_LOG: u64 = 6;
    const AUTO_ROLE: u64 = 77;

    struct Harness {
        router: EventRouter,
        gateway: Arc<MockGateway>,
        store: Arc<InMemoryGuildStore>,
        services: Arc<BotServices>,
    }

    async fn harness() -> Harness {
        let store = Arc::new(InMemoryGuildStore::new());
        let config = Arc::new(ConfigService::new(store.clone(), "!!"));
        let services = Arc::new(BotServices::new(
            OwnerSet::default(),
            CommandRegistry::new(),
            config,
            store.clone(),
            store.clone(),
        ));
        let gateway = Arc::new(MockGateway::new());
        gateway.grant(BOT_ID, CapabilitySet::from([Capability::Administrator]));

        let router = EventRouter::new(services.clone(), gateway.clone());
        router
            .handle(GatewayEvent::GuildJoined {
                guild_id: GUILD,
                name: "Test Guild".into(),
                system_channel_id: Some(SYSTEM),
            })
            .await
            .unwrap();

        Harness {
            router,
            gateway,
            store,
            services,
        }
    }

    fn member(user_id: u64) -> MemberInfo {
        MemberInfo {
            guild_id: GUILD,
            user_id,
            display_name: "newcomer".into(),
            is_bot: false,
            role_ids: vec![],
            avatar_url: None,
            joined_at: None,
            account_created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn guild_join_creates_config_with_system_channel() {
        let h = harness().await;
        let config = h.services.config.get(GUILD).unwrap();
        assert_eq!(config.system_channel_id, Some(SYSTEM));
        assert_eq!(config.prefix, "!!");
    }

    #[tokio::test]
    async fn member_join_assigns_auto_role_and_logs() {
        let h = harness().await;
        h.services
            .config
            .update(GUILD, ConfigUpdate::AutoRole(Some(AUTO_ROLE)))
            .await
            .unwrap();
        h.services
            .config
            .update(GUILD, ConfigUpdate::MemberLogChannel(Some(MEMBER_LOG)))
            .await
            .unwrap();
        h.gateway.set_role_position(AUTO_ROLE, 1);
        h.gateway.add_member(GUILD, 30, "newcomer", vec![]);

        h.router.handle(GatewayEvent::MemberJoined(member(30))).await.unwrap();

        assert_eq!(h.gateway.role_log(), vec![("add", 30, AUTO_ROLE)]);
        assert_eq!(h.store.list_members(GUILD).await.unwrap().len(), 1);
        let sent = h.gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, MEMBER_LOG);
        assert_eq!(sent[0].1.title.as_deref(), Some("Member Joined"));
    }

    #[tokio::test]
    async fn failed_auto_role_reports_to_system_channel() {
        let h = harness().await;
        h.services
            .config
            .update(GUILD, ConfigUpdate::AutoRole(Some(AUTO_ROLE)))
            .await
            .unwrap();
        h.gateway.set_role_position(AUTO_ROLE, 1);
        h.gateway.fail_role_changes.store(true, Ordering::SeqCst);

        h.router.handle(GatewayEvent::MemberJoined(member(31))).await.unwrap();

        let sent = h.gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, SYSTEM);
        assert_eq!(sent[0].1.title.as_deref(), Some("System Error: `auto role`"));
        // The member row is still written
        assert_eq!(h.store.list_members(GUILD).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn message_edit_and_delete_use_snapshots() {
        let h = harness().await;
        h.services
            .config
            .update(GUILD, ConfigUpdate::MessageDeleteLogChannel(Some(8)))
            .await
            .unwrap();

        let message = InboundMessage {
            message_id: 500,
            guild_id: Some(GUILD),
            channel_id: 10,
            author_id: 40,
            author_name: "chatter".into(),
            author_is_bot: false,
            avatar_url: None,
            content: "first draft".into(),
            attachments: vec![],
        };
        h.router.handle(GatewayEvent::MessageCreated(message)).await.unwrap();

        h.router
            .handle(GatewayEvent::MessageEdited {
                guild_id: Some(GUILD),
                channel_id: 10,
                message_id: 500,
                new_content: Some("second draft".into()),
            })
            .await
            .unwrap();
        // No edit log channel: nothing sent, but the snapshot moved on
        assert!(h.gateway.sent().is_empty());

        h.router
            .handle(GatewayEvent::MessageDeleted {
                guild_id: Some(GUILD),
                channel_id: 10,
                message_id: 500,
            })
            .await
            .unwrap();

        let sent = h.gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 8);
        assert_eq!(sent[0].1.field_value("Message"), Some("second draft"));
    }

    #[tokio::test]
    async fn guild_leave_drops_config_members_and_warns() {
        let h = harness().await;
        h.store
            .add_member(MembershipRecord {
                guild_id: GUILD,
                user_id: 30,
                display_name: "x".into(),
                joined_at: Utc::now(),
            })
            .await
            .unwrap();
        h.store
            .add_warn(
                GUILD,
                30,
                WarnRecord {
                    moderator_id: 2,
                    issued_at: Utc::now(),
                    reason: "`None`".into(),
                },
            )
            .await
            .unwrap();

        h.router
            .handle(GatewayEvent::GuildLeft { guild_id: GUILD })
            .await
            .unwrap();

        assert!(h.services.config.get(GUILD).is_none());
        assert!(h.store.get_config(GUILD).await.unwrap().is_none());
        assert!(h.store.list_members(GUILD).await.unwrap().is_empty());
        assert!(h.store.list_warns(GUILD, 30).await.unwrap().is_empty());
    }
}
