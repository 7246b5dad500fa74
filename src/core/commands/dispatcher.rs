// Command dispatcher - turns an inbound message into at most one handler run.
//
// Every message walks the same gates, and any gate may end the run:
//
//   trigger match -> resolve -> mod-only channel -> permissions -> cooldown -> execute
//
// Each run is independent. The only state shared between runs is the
// cooldown table and whatever the handlers touch through `BotServices`.

use super::command_models::{Command, CommandCategory};
use super::cooldown::CooldownTracker;
use super::handler::{CommandContext, ErrorKind};
use super::permissions::{PermissionDecision, PermissionGate};
use super::replies::{
    command_error_reply, cooldown_reply, greeting_reply, missing_capabilities_reply,
    unexpected_failure_reply, Attribution,
};
use crate::core::gateway::{Gateway, InboundMessage, Reply};
use crate::core::services::BotServices;
use std::sync::Arc;

/// How a dispatch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Bot author, direct message, or a channel the bot can't answer in.
    Ignored,
    /// No prefix or bot mention.
    NotATrigger,
    /// A bare bot mention; the greeting was sent.
    Greeting,
    /// Triggered, but the token names no command or alias.
    UnknownCommand,
    /// Dropped by the mod-only channel rule.
    Restricted,
    Denied,
    OnCooldown,
    Executed,
    /// The handler returned an error or died.
    Failed,
}

/// A message that matched the trigger, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    prefix: String,
    /// The lowercased command token, empty for a bare mention.
    token: String,
    args: Vec<String>,
}

pub struct CommandDispatcher {
    services: Arc<BotServices>,
    gateway: Arc<dyn Gateway>,
    gate: PermissionGate,
    cooldowns: CooldownTracker,
}

impl CommandDispatcher {
    pub fn new(services: Arc<BotServices>, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gate: PermissionGate::new(services.owners.clone()),
            services,
            gateway,
            cooldowns: CooldownTracker::new(),
        }
    }

    pub async fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        let outcome = self.run(message).await;
        tracing::debug!(?outcome, "Dispatch finished");
        outcome
    }

    async fn run(&self, message: InboundMessage) -> DispatchOutcome {
        if message.author_is_bot {
            return DispatchOutcome::Ignored;
        }
        let guild_id = match message.guild_id {
            Some(id) => id,
            None => return DispatchOutcome::Ignored,
        };
        if !self.gateway.channel_accessible(guild_id, message.channel_id) {
            return DispatchOutcome::Ignored;
        }

        let prefix = self.services.config.prefix_for(guild_id);
        let invocation = match parse_invocation(&message.content, &prefix, self.gateway.bot_user_id()) {
            Some(invocation) => invocation,
            None => return DispatchOutcome::NotATrigger,
        };

        let command = match self.services.registry.resolve(&invocation.token) {
            Some(command) => command,
            None if invocation.token.is_empty() && invocation.prefix != prefix => {
                // Bare mention
                let greeting = greeting_reply(&self.gateway.bot_name(), &prefix);
                if let Err(e) = self.gateway.send(message.channel_id, greeting).await {
                    tracing::warn!(channel_id = message.channel_id, "Failed to send greeting: {}", e);
                }
                return DispatchOutcome::Greeting;
            }
            None => return DispatchOutcome::UnknownCommand,
        };

        if self.is_restricted(guild_id, &message, &command) {
            tracing::debug!(
                guild_id,
                channel_id = message.channel_id,
                command = %command.name,
                "Command dropped in mod-only channel"
            );
            return DispatchOutcome::Restricted;
        }

        let user = Attribution {
            name: message.author_name.clone(),
            icon_url: message.avatar_url.clone(),
        };

        let decision = self.gate.check(
            self.gateway.as_ref(),
            guild_id,
            message.channel_id,
            message.author_id,
            &command,
            true,
        );
        if let PermissionDecision::Denied(denial) = decision {
            tracing::info!(
                guild_id,
                user_id = message.author_id,
                command = %command.name,
                reason = ?denial.reason(),
                "Command denied"
            );
            if denial.owner_only {
                return DispatchOutcome::Denied;
            }
            if !denial.missing_bot.is_empty() {
                let bot = Attribution {
                    name: self.gateway.bot_name(),
                    icon_url: None,
                };
                let reply = missing_capabilities_reply(
                    &command,
                    &prefix,
                    ErrorKind::MissingBotPermission,
                    &denial.missing_bot,
                    &bot,
                );
                self.send(message.channel_id, reply).await;
            }
            if !denial.missing_user.is_empty() {
                let reply = missing_capabilities_reply(
                    &command,
                    &prefix,
                    ErrorKind::MissingUserPermission,
                    &denial.missing_user,
                    &user,
                );
                self.send(message.channel_id, reply).await;
            }
            return DispatchOutcome::Denied;
        }

        if let Some(active) = self.cooldowns.get_or_start(
            &command.name,
            message.author_id,
            command.cooldown_secs,
            self.gate.is_owner(message.author_id),
        ) {
            let reply = cooldown_reply(&command, active.remaining_secs(), &user);
            self.send(message.channel_id, reply).await;
            return DispatchOutcome::OnCooldown;
        }

        self.execute(guild_id, message, command, prefix, invocation.args, user)
            .await
    }

    /// Channels on the mod-only list run mod commands only, and only for
    /// actors holding that command's user capabilities there.
    fn is_restricted(&self, guild_id: u64, message: &InboundMessage, command: &Command) -> bool {
        let config = match self.services.config.get(guild_id) {
            Some(config) => config,
            None => return false,
        };
        if !config.is_mod_only_channel(message.channel_id) {
            return false;
        }

        command.category != CommandCategory::Mod
            || !self.gateway.has_capabilities(
                guild_id,
                message.channel_id,
                message.author_id,
                &command.user_capabilities,
            )
    }

    async fn execute(
        &self,
        guild_id: u64,
        message: InboundMessage,
        command: Arc<Command>,
        prefix: String,
        args: Vec<String>,
        user: Attribution,
    ) -> DispatchOutcome {
        let channel_id = message.channel_id;
        let ctx = CommandContext {
            message,
            guild_id,
            command: Arc::clone(&command),
            prefix: prefix.clone(),
            gateway: Arc::clone(&self.gateway),
            services: Arc::clone(&self.services),
        };

        tracing::info!(
            guild_id,
            user_id = ctx.author_id(),
            command = %command.name,
            "Running command"
        );

        // Own task, so a panicking handler surfaces as a JoinError here
        let handler = Arc::clone(&command.handler);
        let joined = tokio::spawn(async move { handler.run(ctx, args).await }).await;

        match joined {
            Ok(Ok(())) => DispatchOutcome::Executed,
            Ok(Err(err)) => {
                if err.kind() == ErrorKind::CommandFailure {
                    tracing::error!(guild_id, command = %command.name, error = %err, "Command failed");
                } else {
                    tracing::debug!(guild_id, command = %command.name, error = %err, "Bad command input");
                }
                let reply = command_error_reply(&command, &prefix, &err, &user);
                self.send(channel_id, reply).await;
                DispatchOutcome::Failed
            }
            Err(join_err) => {
                tracing::error!(guild_id, command = %command.name, "Command task died: {}", join_err);
                let reply = unexpected_failure_reply(&command, &prefix, &user);
                self.send(channel_id, reply).await;
                DispatchOutcome::Failed
            }
        }
    }

    /// Sends are logged on failure, never retried.
    async fn send(&self, channel_id: u64, reply: Reply) {
        if let Err(e) = self.gateway.send(channel_id, reply).await {
            tracing::warn!(channel_id, "Failed to send reply: {}", e);
        }
    }
}

/// Match a bot mention or the prefix and split what follows on spaces.
/// Mentions win, so prefixes like `<@` cannot swallow them.
fn parse_invocation(content: &str, prefix: &str, bot_id: u64) -> Option<Invocation> {
    let mentions = [format!("<@{}>", bot_id), format!("<@!{}>", bot_id)];

    let (matched, rest) = match mentions.iter().find(|m| content.starts_with(m.as_str())) {
        Some(mention) => (mention.clone(), &content[mention.len()..]),
        None if !prefix.is_empty() && content.starts_with(prefix) => {
            (prefix.to_string(), &content[prefix.len()..])
        }
        None => return None,
    };

    let mut parts = rest.trim_start().split(' ').filter(|part| !part.is_empty());
    let token = parts.next().unwrap_or_default().to_lowercase();
    let args = parts.map(str::to_string).collect();

    Some(Invocation {
        prefix: matched,
        token,
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::capabilities::{Capability, CapabilitySet};
    use crate::core::commands::command_models::CommandDefinition;
    use crate::core::commands::handler::{CommandError, CommandHandler};
    use crate::core::commands::permissions::OwnerSet;
    use crate::core::commands::registry::CommandRegistry;
    use crate::core::config::{ConfigService, ConfigUpdate};
    use crate::core::gateway::mock::{MockGateway, BOT_ID};
    use crate::infra::memory::InMemoryGuildStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const GUILD: u64 = 1;
    const CHANNEL: u64 = 10;
    const OWNER: u64 = 100;
    const USER: u64 = 200;

    /// Counts runs and records the args it saw.
    #[derive(Default)]
    struct Recorder {
        runs: AtomicUsize,
        args: std::sync::Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl CommandHandler for Recorder {
        async fn run(&self, _ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.args.lock().unwrap().push(args);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl CommandHandler for Failing {
        async fn run(&self, _ctx: CommandContext, _args: Vec<String>) -> Result<(), CommandError> {
            Err(CommandError::missing("Please provide a reason"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl CommandHandler for Panicking {
        async fn run(&self, _ctx: CommandContext, _args: Vec<String>) -> Result<(), CommandError> {
            panic!("handler blew up");
        }
    }

    struct Harness {
        dispatcher: CommandDispatcher,
        gateway: Arc<MockGateway>,
        services: Arc<BotServices>,
        recorder: Arc<Recorder>,
    }

    async fn harness() -> Harness {
        let recorder = Arc::new(Recorder::default());
        let mut registry = CommandRegistry::new();
        registry
            .register(
                CommandDefinition::new("ping", recorder.clone())
                    .aliases(&["pong"])
                    .category("info"),
            )
            .unwrap();
        registry
            .register(
                CommandDefinition::new("warn", recorder.clone())
                    .category("mod")
                    .user_capabilities(&["KICK_MEMBERS"]),
            )
            .unwrap();
        registry
            .register(CommandDefinition::new("slow", recorder.clone()).cooldown(5))
            .unwrap();
        registry
            .register(CommandDefinition::new("secret", recorder.clone()).owner_only())
            .unwrap();
        registry
            .register(CommandDefinition::new("broken", Arc::new(Failing)).usage("broken <reason>"))
            .unwrap();
        registry
            .register(CommandDefinition::new("explode", Arc::new(Panicking)))
            .unwrap();

        let store = Arc::new(InMemoryGuildStore::new());
        let config = Arc::new(ConfigService::new(store.clone(), "!!"));
        config.ensure_guild(GUILD, None).await.unwrap();

        let services = Arc::new(BotServices::new(
            OwnerSet::new([OWNER]),
            registry,
            config,
            store.clone(),
            store,
        ));

        let gateway = Arc::new(MockGateway::new());
        gateway.grant(
            BOT_ID,
            CapabilitySet::from([
                Capability::ViewChannel,
                Capability::SendMessages,
                Capability::EmbedLinks,
            ]),
        );

        Harness {
            dispatcher: CommandDispatcher::new(services.clone(), gateway.clone()),
            gateway,
            services,
            recorder,
        }
    }

    fn message(author_id: u64, content: &str) -> InboundMessage {
        InboundMessage {
            message_id: 1,
            guild_id: Some(GUILD),
            channel_id: CHANNEL,
            author_id,
            author_name: "someone".into(),
            author_is_bot: false,
            avatar_url: None,
            content: content.into(),
            attachments: vec![],
        }
    }

    #[test]
    fn invocation_parsing() {
        let inv = parse_invocation("!!Ping  a   b", "!!", BOT_ID).unwrap();
        assert_eq!(inv.token, "ping");
        assert_eq!(inv.args, vec!["a", "b"]);
        assert_eq!(inv.prefix, "!!");

        let inv = parse_invocation("<@!9000> help", "!!", BOT_ID).unwrap();
        assert_eq!(inv.token, "help");
        assert_eq!(inv.prefix, "<@!9000>");

        let bare = parse_invocation("<@9000>", "!!", BOT_ID).unwrap();
        assert!(bare.token.is_empty());

        assert!(parse_invocation("hello !!ping", "!!", BOT_ID).is_none());
        assert!(parse_invocation("<@123> ping", "!!", BOT_ID).is_none());
    }

    #[test]
    fn mention_wins_over_overlapping_prefix() {
        for prefix in ["<", "<@", "<@!"] {
            let bare = parse_invocation("<@9000>", prefix, BOT_ID).unwrap();
            assert_eq!(bare.prefix, "<@9000>", "{}", prefix);
            assert!(bare.token.is_empty());

            let inv = parse_invocation("<@!9000> help", prefix, BOT_ID).unwrap();
            assert_eq!(inv.token, "help");
        }

        let inv = parse_invocation("<@ping", "<@", BOT_ID).unwrap();
        assert_eq!(inv.prefix, "<@");
        assert_eq!(inv.token, "ping");
    }

    #[tokio::test]
    async fn runs_resolved_command_with_args() {
        let h = harness().await;
        let outcome = h.dispatcher.dispatch(message(USER, "!!pong one two")).await;

        assert_eq!(outcome, DispatchOutcome::Executed);
        assert_eq!(h.recorder.runs.load(Ordering::SeqCst), 1);
        assert_eq!(*h.recorder.args.lock().unwrap(), vec![vec!["one".to_string(), "two".to_string()]]);
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn unknown_token_is_silent() {
        let h = harness().await;
        let outcome = h.dispatcher.dispatch(message(USER, "!!nosuchthing")).await;

        assert_eq!(outcome, DispatchOutcome::UnknownCommand);
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn ignores_bots_dms_and_plain_chatter() {
        let h = harness().await;

        let mut from_bot = message(USER, "!!ping");
        from_bot.author_is_bot = true;
        assert_eq!(h.dispatcher.dispatch(from_bot).await, DispatchOutcome::Ignored);

        let mut dm = message(USER, "!!ping");
        dm.guild_id = None;
        assert_eq!(h.dispatcher.dispatch(dm).await, DispatchOutcome::Ignored);

        assert_eq!(
            h.dispatcher.dispatch(message(USER, "just chatting")).await,
            DispatchOutcome::NotATrigger
        );
        assert_eq!(h.recorder.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bare_mention_sends_greeting() {
        let h = harness().await;
        let outcome = h.dispatcher.dispatch(message(USER, "<@9000>")).await;

        assert_eq!(outcome, DispatchOutcome::Greeting);
        assert_eq!(h.gateway.sent_titles(), vec!["Hi, I'm TestBot. Need help?"]);
    }

    #[tokio::test]
    async fn bare_mention_greets_under_angle_bracket_prefix() {
        let h = harness().await;
        h.services
            .config
            .update(GUILD, ConfigUpdate::Prefix("<@".into()))
            .await
            .unwrap();

        let outcome = h.dispatcher.dispatch(message(USER, "<@9000>")).await;
        assert_eq!(outcome, DispatchOutcome::Greeting);
    }

    #[tokio::test]
    async fn guild_prefix_replaces_default() {
        let h = harness().await;
        h.services
            .config
            .update(GUILD, ConfigUpdate::Prefix("?".into()))
            .await
            .unwrap();

        assert_eq!(h.dispatcher.dispatch(message(USER, "!!ping")).await, DispatchOutcome::NotATrigger);
        assert_eq!(h.dispatcher.dispatch(message(USER, "?ping")).await, DispatchOutcome::Executed);
    }

    #[tokio::test]
    async fn missing_user_capability_sends_one_denial() {
        let h = harness().await;
        let outcome = h.dispatcher.dispatch(message(USER, "!!warn <@5>")).await;

        assert_eq!(outcome, DispatchOutcome::Denied);
        assert_eq!(h.recorder.runs.load(Ordering::SeqCst), 0);

        let sent = h.gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1.description.as_deref(),
            Some("```diff\n+ Missing User Permissions\n- Kick Members```")
        );
    }

    #[tokio::test]
    async fn owner_only_denial_is_silent() {
        let h = harness().await;

        assert_eq!(h.dispatcher.dispatch(message(USER, "!!secret")).await, DispatchOutcome::Denied);
        assert!(h.gateway.sent().is_empty());

        assert_eq!(h.dispatcher.dispatch(message(OWNER, "!!secret")).await, DispatchOutcome::Executed);
    }

    #[tokio::test]
    async fn inaccessible_channel_is_ignored() {
        let h = harness().await;
        h.gateway.grant_in(CHANNEL, BOT_ID, CapabilitySet::from([Capability::ViewChannel]));

        assert_eq!(h.dispatcher.dispatch(message(USER, "!!ping")).await, DispatchOutcome::Ignored);
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn mod_only_channels_drop_everything_else() {
        let h = harness().await;
        h.services
            .config
            .update(GUILD, ConfigUpdate::ModOnlyChannels(vec![CHANNEL]))
            .await
            .unwrap();

        assert_eq!(h.dispatcher.dispatch(message(USER, "!!ping")).await, DispatchOutcome::Restricted);
        // Mod command, but the actor can't use it here
        assert_eq!(h.dispatcher.dispatch(message(USER, "!!warn <@5>")).await, DispatchOutcome::Restricted);
        assert!(h.gateway.sent().is_empty());

        h.gateway.grant(USER, CapabilitySet::from([Capability::KickMembers]));
        assert_eq!(h.dispatcher.dispatch(message(USER, "!!warn <@5>")).await, DispatchOutcome::Executed);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_blocks_until_window_elapses() {
        let h = harness().await;

        assert_eq!(h.dispatcher.dispatch(message(USER, "!!slow")).await, DispatchOutcome::Executed);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.dispatcher.dispatch(message(USER, "!!slow")).await, DispatchOutcome::OnCooldown);
        assert_eq!(
            h.gateway.sent()[0].1.description.as_deref(),
            Some("This command is on cooldown for another `3` seconds.")
        );

        // Owners skip cooldowns entirely
        assert_eq!(h.dispatcher.dispatch(message(OWNER, "!!slow")).await, DispatchOutcome::Executed);
        assert_eq!(h.dispatcher.dispatch(message(OWNER, "!!slow")).await, DispatchOutcome::Executed);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(h.dispatcher.dispatch(message(USER, "!!slow")).await, DispatchOutcome::Executed);
    }

    #[tokio::test]
    async fn handler_errors_become_error_replies() {
        let h = harness().await;
        assert_eq!(h.dispatcher.dispatch(message(USER, "!!broken")).await, DispatchOutcome::Failed);

        let sent = h.gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.title.as_deref(), Some("Error: `broken`"));
        assert_eq!(sent[0].1.field_value("Usage"), Some("`!!broken <reason>`"));
    }

    #[tokio::test]
    async fn panicking_handler_does_not_take_down_dispatch() {
        let h = harness().await;
        assert_eq!(h.dispatcher.dispatch(message(USER, "!!explode")).await, DispatchOutcome::Failed);
        assert_eq!(h.gateway.sent_titles(), vec!["Error: `explode`"]);

        // Still dispatching afterwards
        assert_eq!(h.dispatcher.dispatch(message(USER, "!!ping")).await, DispatchOutcome::Executed);
    }
}
