// Permission gate - decides whether a resolved command may run.
//
// Both sides are always evaluated so the caller can report everything that's
// missing in one go:
//
//   bot side:  required bot capabilities minus what the bot holds in the channel
//   user side: 1. no owner_only and no required capabilities -> allow
//              2. owner override and actor is an owner       -> allow
//              3. owner_only and actor is not an owner       -> deny (silently)
//              4. actor holds Administrator                  -> allow
//              5. otherwise allow only if nothing is missing
//
// Owner override beats capability checks, never the other way round, and the
// Administrator bypass only exists on the user side.

use super::capabilities::{Capability, CapabilitySet};
use super::command_models::Command;
use crate::core::gateway::Gateway;
use std::collections::HashSet;

/// The configured bot owners.
#[derive(Debug, Clone, Default)]
pub struct OwnerSet(HashSet<u64>);

impl OwnerSet {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn contains(&self, user_id: u64) -> bool {
        self.0.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    MissingBotPermission,
    MissingUserPermission,
    OwnerOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDenial {
    pub missing_bot: CapabilitySet,
    pub missing_user: CapabilitySet,
    /// The actor hit an owner-only command without being an owner.
    pub owner_only: bool,
}

impl PermissionDenial {
    /// The first failing check, bot side first.
    pub fn reason(&self) -> DenialReason {
        if !self.missing_bot.is_empty() {
            DenialReason::MissingBotPermission
        } else if self.owner_only {
            DenialReason::OwnerOnly
        } else {
            DenialReason::MissingUserPermission
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    Allowed,
    Denied(PermissionDenial),
}

impl PermissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionDecision::Allowed)
    }
}

enum UserSide {
    Allowed,
    OwnerOnly,
    Missing(CapabilitySet),
}

pub struct PermissionGate {
    owners: OwnerSet,
}

impl PermissionGate {
    pub fn new(owners: OwnerSet) -> Self {
        Self { owners }
    }

    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owners.contains(user_id)
    }

    /// Evaluate against the capabilities the platform reports for the bot and
    /// the actor in the invoking channel.
    pub fn check(
        &self,
        gateway: &dyn Gateway,
        guild_id: u64,
        channel_id: u64,
        actor_id: u64,
        command: &Command,
        owner_override: bool,
    ) -> PermissionDecision {
        let bot_held = gateway.capabilities(guild_id, channel_id, gateway.bot_user_id());
        let user_held = gateway.capabilities(guild_id, channel_id, actor_id);
        self.evaluate(command, &bot_held, &user_held, actor_id, owner_override)
    }

    /// The pure decision, given what each side holds.
    pub fn evaluate(
        &self,
        command: &Command,
        bot_held: &CapabilitySet,
        user_held: &CapabilitySet,
        actor_id: u64,
        owner_override: bool,
    ) -> PermissionDecision {
        let missing_bot = if bot_held.contains(Capability::Administrator) {
            CapabilitySet::new()
        } else {
            command.bot_capabilities.missing_from(bot_held)
        };

        let user_side = self.evaluate_user(command, user_held, actor_id, owner_override);

        match (missing_bot.is_empty(), user_side) {
            (true, UserSide::Allowed) => PermissionDecision::Allowed,
            (_, UserSide::Allowed) => PermissionDecision::Denied(PermissionDenial {
                missing_bot,
                missing_user: CapabilitySet::new(),
                owner_only: false,
            }),
            (_, UserSide::OwnerOnly) => PermissionDecision::Denied(PermissionDenial {
                missing_bot,
                missing_user: CapabilitySet::new(),
                owner_only: true,
            }),
            (_, UserSide::Missing(missing_user)) => PermissionDecision::Denied(PermissionDenial {
                missing_bot,
                missing_user,
                owner_only: false,
            }),
        }
    }

    fn evaluate_user(
        &self,
        command: &Command,
        user_held: &CapabilitySet,
        actor_id: u64,
        owner_override: bool,
    ) -> UserSide {
        if !command.owner_only && command.user_capabilities.is_empty() {
            return UserSide::Allowed;
        }
        let is_owner = self.is_owner(actor_id);
        if owner_override && is_owner {
            return UserSide::Allowed;
        }
        if command.owner_only && !is_owner {
            return UserSide::OwnerOnly;
        }
        if user_held.contains(Capability::Administrator) {
            return UserSide::Allowed;
        }

        let missing = command.user_capabilities.missing_from(user_held);
        if missing.is_empty() {
            UserSide::Allowed
        } else {
            UserSide::Missing(missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::command_models::CommandCategory;
    use crate::core::commands::handler::{CommandContext, CommandError, CommandHandler};
    use async_trait::async_trait;
    use std::sync::Arc;

    const OWNER: u64 = 1;
    const USER: u64 = 2;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn run(&self, _: CommandContext, _: Vec<String>) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn command(user_caps: CapabilitySet, owner_only: bool) -> Command {
        Command {
            name: "test".into(),
            aliases: vec![],
            usage: "test".into(),
            description: String::new(),
            category: CommandCategory::Mod,
            cooldown_secs: 0,
            bot_capabilities: Command::default_bot_capabilities(),
            user_capabilities: user_caps,
            examples: vec![],
            owner_only,
            handler: Arc::new(Noop),
        }
    }

    fn gate() -> PermissionGate {
        PermissionGate::new(OwnerSet::new([OWNER]))
    }

    fn bot_ok() -> CapabilitySet {
        Command::default_bot_capabilities()
    }

    #[test]
    fn no_requirements_allows_everyone() {
        let cmd = command(CapabilitySet::new(), false);
        assert!(gate()
            .evaluate(&cmd, &bot_ok(), &CapabilitySet::new(), USER, true)
            .is_allowed());
    }

    #[test]
    fn owner_only_allows_owner_and_denies_everyone_else() {
        let cmd = command(CapabilitySet::from([Capability::BanMembers]), true);
        let everything: CapabilitySet = Capability::ALL.into_iter().collect();

        assert!(gate()
            .evaluate(&cmd, &bot_ok(), &CapabilitySet::new(), OWNER, true)
            .is_allowed());

        // Even an administrator can't run an owner-only command
        match gate().evaluate(&cmd, &bot_ok(), &everything, USER, true) {
            PermissionDecision::Denied(denial) => {
                assert_eq!(denial.reason(), DenialReason::OwnerOnly);
                assert!(denial.missing_user.is_empty());
            }
            PermissionDecision::Allowed => panic!("non-owner ran an owner-only command"),
        }
    }

    #[test]
    fn owner_override_can_be_disabled() {
        let cmd = command(CapabilitySet::from([Capability::ManageRoles]), false);
        let decision = gate().evaluate(&cmd, &bot_ok(), &CapabilitySet::new(), OWNER, false);
        assert!(!decision.is_allowed());
    }

    #[test]
    fn administrator_bypasses_user_side_only() {
        let cmd = command(CapabilitySet::from([Capability::ManageRoles]), false);
        let admin = CapabilitySet::from([Capability::Administrator]);

        assert!(gate().evaluate(&cmd, &bot_ok(), &admin, USER, true).is_allowed());

        // Bot side still applies
        let bot_missing_embed = CapabilitySet::from([Capability::SendMessages]);
        match gate().evaluate(&cmd, &bot_missing_embed, &admin, USER, true) {
            PermissionDecision::Denied(denial) => {
                assert_eq!(denial.reason(), DenialReason::MissingBotPermission);
                assert_eq!(denial.missing_bot, CapabilitySet::from([Capability::EmbedLinks]));
                assert!(denial.missing_user.is_empty());
            }
            PermissionDecision::Allowed => panic!("bot side was ignored"),
        }
    }

    #[test]
    fn both_sides_are_reported() {
        let cmd = command(
            CapabilitySet::from([Capability::KickMembers, Capability::ManageMessages]),
            false,
        );
        let user_held = CapabilitySet::from([Capability::KickMembers]);

        match gate().evaluate(&cmd, &CapabilitySet::new(), &user_held, USER, true) {
            PermissionDecision::Denied(denial) => {
                assert_eq!(denial.missing_bot, Command::default_bot_capabilities());
                assert_eq!(
                    denial.missing_user,
                    CapabilitySet::from([Capability::ManageMessages])
                );
            }
            PermissionDecision::Allowed => panic!("expected a denial"),
        }
    }
}
