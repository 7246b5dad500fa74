// Reply cards the engine itself sends: errors, denials, cooldown notices,
// the greeting and system errors. Command bodies build their own.

use super::capabilities::CapabilitySet;
use super::command_models::Command;
use super::handler::{CommandError, ErrorKind};
use crate::core::gateway::{Reply, Tone};

/// Who a reply is attributed to (shown as the card author).
#[derive(Debug, Clone)]
pub struct Attribution {
    pub name: String,
    pub icon_url: Option<String>,
}

pub fn error_reply(
    command: &Command,
    prefix: &str,
    kind: ErrorKind,
    detail: &str,
    diagnostic: Option<&str>,
    attribution: &Attribution,
) -> Reply {
    let mut reply = Reply::new(format!("Error: `{}`", command.name))
        .description(format!("```diff\n+ {}\n- {}```", kind.label(), detail))
        .author(attribution.name.clone(), attribution.icon_url.clone())
        .tone(Tone::Error);

    if kind.is_input_error() {
        reply = reply.field("Usage", format!("`{}{}`", prefix, command.usage), false);
        if !command.examples.is_empty() {
            let examples = command
                .examples
                .iter()
                .map(|e| format!("`{}{}`", prefix, e))
                .collect::<Vec<_>>()
                .join("\n");
            reply = reply.field("Examples", examples, false);
        }
    }

    if let Some(diagnostic) = diagnostic {
        reply = reply.field("Error Message", format!("```{}```", diagnostic), false);
    }

    reply
}

pub fn command_error_reply(
    command: &Command,
    prefix: &str,
    err: &CommandError,
    attribution: &Attribution,
) -> Reply {
    error_reply(
        command,
        prefix,
        err.kind(),
        &err.detail(),
        err.diagnostic().as_deref(),
        attribution,
    )
}

/// Lists the missing capabilities, one per diff line.
pub fn missing_capabilities_reply(
    command: &Command,
    prefix: &str,
    kind: ErrorKind,
    missing: &CapabilitySet,
    attribution: &Attribution,
) -> Reply {
    let detail = missing
        .iter()
        .map(|cap| cap.label())
        .collect::<Vec<_>>()
        .join("\n- ");
    error_reply(command, prefix, kind, &detail, None, attribution)
}

/// Sent when a handler panicked or its task died.
pub fn unexpected_failure_reply(command: &Command, prefix: &str, attribution: &Attribution) -> Reply {
    error_reply(
        command,
        prefix,
        ErrorKind::CommandFailure,
        "Something went wrong, please try again later",
        None,
        attribution,
    )
}

pub fn cooldown_reply(command: &Command, remaining_secs: u64, attribution: &Attribution) -> Reply {
    let plural = if remaining_secs != 1 { "s" } else { "" };
    Reply::new(format!("Active Cooldown: `{}`", command.name))
        .description(format!(
            "This command is on cooldown for another `{}` second{}.",
            remaining_secs, plural
        ))
        .author(attribution.name.clone(), attribution.icon_url.clone())
        .tone(Tone::Warning)
}

pub fn greeting_reply(bot_name: &str, prefix: &str) -> Reply {
    Reply::new(format!("Hi, I'm {}. Need help?", bot_name))
        .description(format!(
            "You can see everything I can do by using the `{}help` command.",
            prefix
        ))
        .tone(Tone::Info)
}

/// Posted to a guild's system channel when background work fails.
pub fn system_error_reply(action: &str, kind: &str, detail: &str, diagnostic: Option<&str>) -> Reply {
    let mut reply = Reply::new(format!("System Error: `{}`", action))
        .description(format!("```diff\n+ {}\n+ {}```", kind, detail))
        .tone(Tone::Error);
    if let Some(diagnostic) = diagnostic {
        reply = reply.field("Error Message", format!("```{}```", diagnostic), false);
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::capabilities::Capability;
    use crate::core::commands::command_models::CommandCategory;
    use crate::core::commands::handler::{CommandContext, CommandHandler};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn run(&self, _: CommandContext, _: Vec<String>) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn mute_command() -> Command {
        Command {
            name: "mute".into(),
            aliases: vec![],
            usage: "mute <user mention/ID> <time> [reason]".into(),
            description: String::new(),
            category: CommandCategory::Mod,
            cooldown_secs: 0,
            bot_capabilities: Command::default_bot_capabilities(),
            user_capabilities: CapabilitySet::new(),
            examples: vec!["mute @Nettles 10s".into(), "mute @Nettles 30m talks too much".into()],
            owner_only: false,
            handler: Arc::new(Noop),
        }
    }

    fn user() -> Attribution {
        Attribution {
            name: "someone".into(),
            icon_url: None,
        }
    }

    #[test]
    fn input_errors_show_usage_and_examples() {
        let reply = command_error_reply(
            &mute_command(),
            "!!",
            &CommandError::missing("Please provide a mute duration"),
            &user(),
        );

        assert_eq!(reply.title.as_deref(), Some("Error: `mute`"));
        assert_eq!(
            reply.description.as_deref(),
            Some("```diff\n+ Missing Argument\n- Please provide a mute duration```")
        );
        assert_eq!(
            reply.field_value("Usage"),
            Some("`!!mute <user mention/ID> <time> [reason]`")
        );
        assert_eq!(
            reply.field_value("Examples"),
            Some("`!!mute @Nettles 10s`\n`!!mute @Nettles 30m talks too much`")
        );
        assert!(reply.field_value("Error Message").is_none());
    }

    #[test]
    fn failures_show_diagnostic_but_no_usage() {
        let reply = command_error_reply(
            &mute_command(),
            "!!",
            &CommandError::failure("Please check the role hierarchy", Some("Missing Access".into())),
            &user(),
        );

        assert!(reply.field_value("Usage").is_none());
        assert_eq!(reply.field_value("Error Message"), Some("```Missing Access```"));
    }

    #[test]
    fn missing_capabilities_are_listed_one_per_line() {
        let missing = CapabilitySet::from([Capability::ManageRoles, Capability::KickMembers]);
        let reply = missing_capabilities_reply(
            &mute_command(),
            "!!",
            ErrorKind::MissingUserPermission,
            &missing,
            &user(),
        );
        assert_eq!(
            reply.description.as_deref(),
            Some("```diff\n+ Missing User Permissions\n- Manage Roles\n- Kick Members```")
        );
    }

    #[test]
    fn cooldown_notice_pluralises() {
        let one = cooldown_reply(&mute_command(), 1, &user());
        let many = cooldown_reply(&mute_command(), 4, &user());
        assert_eq!(
            one.description.as_deref(),
            Some("This command is on cooldown for another `1` second.")
        );
        assert_eq!(
            many.description.as_deref(),
            Some("This command is on cooldown for another `4` seconds.")
        );
    }
}
