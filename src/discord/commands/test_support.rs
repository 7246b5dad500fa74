// Shared setup for the built-in command tests: an in-memory store, a warmed
// guild config, the full registry and a recording gateway.

use super::builtin_commands;
use crate::core::commands::capabilities::{Capability, CapabilitySet};
use crate::core::commands::{CommandContext, CommandError, CommandRegistry, OwnerSet};
use crate::core::config::ConfigService;
use crate::core::gateway::mock::{MockGateway, BOT_ID};
use crate::core::gateway::{InboundMessage, Reply};
use crate::core::services::BotServices;
use crate::infra::memory::InMemoryGuildStore;
use std::sync::Arc;

pub const GUILD: u64 = 1;
pub const CHANNEL: u64 = 10;
pub const OWNER: u64 = 7;
pub const MODERATOR: u64 = 20;
pub const MEMBER: u64 = 30;
pub const MOD_ROLE: u64 = 500;
pub const MUTE_ROLE: u64 = 600;

pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub services: Arc<BotServices>,
    pub store: Arc<InMemoryGuildStore>,
}

pub async fn harness() -> Harness {
    let store = Arc::new(InMemoryGuildStore::new());
    let config = Arc::new(ConfigService::new(store.clone(), "!!"));
    config.ensure_guild(GUILD, None).await.unwrap();

    let mut registry = CommandRegistry::new();
    registry.load(builtin_commands());

    let services = Arc::new(BotServices::new(
        OwnerSet::new([OWNER]),
        registry,
        config,
        store.clone(),
        store.clone(),
    ));

    let gateway = Arc::new(MockGateway::new());
    gateway.grant(BOT_ID, CapabilitySet::from([Capability::Administrator]));
    gateway.add_member(GUILD, BOT_ID, "TestBot", vec![]);
    gateway.add_member(GUILD, MODERATOR, "moderator", vec![MOD_ROLE]);
    gateway.add_member(GUILD, MEMBER, "member", vec![]);
    gateway.set_role_position(MOD_ROLE, 10);
    gateway.set_role_position(MUTE_ROLE, 2);

    Harness {
        gateway,
        services,
        store,
    }
}

impl Harness {
    pub fn context(&self, command: &str, author_id: u64) -> CommandContext {
        let command = self
            .services
            .registry
            .resolve(command)
            .expect("command is registered");
        CommandContext {
            message: InboundMessage {
                message_id: 1,
                guild_id: Some(GUILD),
                channel_id: CHANNEL,
                author_id,
                author_name: "moderator".into(),
                author_is_bot: false,
                avatar_url: None,
                content: String::new(),
                attachments: vec![],
            },
            guild_id: GUILD,
            command,
            prefix: self.services.config.prefix_for(GUILD),
            gateway: self.gateway.clone(),
            services: self.services.clone(),
        }
    }

    /// Run a command as the moderator.
    pub async fn run(&self, command: &str, args: &[&str]) -> Result<(), CommandError> {
        self.run_as(MODERATOR, command, args).await
    }

    pub async fn run_as(
        &self,
        author_id: u64,
        command: &str,
        args: &[&str],
    ) -> Result<(), CommandError> {
        let ctx = self.context(command, author_id);
        let handler = Arc::clone(&ctx.command.handler);
        handler
            .run(ctx, args.iter().map(|a| a.to_string()).collect())
            .await
    }

    pub fn last_reply(&self) -> Reply {
        self.gateway
            .sent()
            .pop()
            .map(|(_, reply)| reply)
            .expect("a reply was sent")
    }
}
