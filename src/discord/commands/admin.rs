// Admin commands: guild settings.
//
// Every setter writes through `ConfigService::update`, so the store is
// updated before the cache and a failed write changes nothing.

use super::{mention_or_none, signed, NONE};
use crate::core::commands::{CommandContext, CommandDefinition, CommandError, CommandHandler};
use crate::core::config::{ConfigUpdate, GuildConfig};
use crate::core::gateway::{channel_mention, role_mention, Reply, Tone};
use crate::core::moderation::{parse_channel_id, parse_role_id};
use async_trait::async_trait;
use std::sync::Arc;

const MAX_PREFIX_LEN: usize = 3;
const ARROW: &str = "➔";

pub fn definitions() -> Vec<CommandDefinition> {
    let mut definitions = vec![
        CommandDefinition::new("settings", Arc::new(Settings))
            .aliases(&["set", "s", "config", "conf"])
            .usage("settings [category]")
            .description(
                "Displays the current settings for the given category. \
                 Without a category, shows how many settings each category has.",
            )
            .category("admin")
            .user_capabilities(&["MANAGE_GUILD"])
            .examples(&["settings system", "settings logging"]),
        CommandDefinition::new("setprefix", Arc::new(SetPrefix))
            .aliases(&["setp", "sp"])
            .usage("setprefix <prefix>")
            .description("Sets the command prefix for your server. Max of 3 characters.")
            .category("admin")
            .user_capabilities(&["MANAGE_GUILD"])
            .examples(&["setprefix ?"]),
        CommandDefinition::new("setmodchannels", Arc::new(SetModChannels))
            .aliases(&["setmc", "smc"])
            .usage("setmodchannels <channel mentions/IDs>")
            .description(
                "Sets the moderator only channels for your server. Only `Mod` commands work \
                 in these channels, and only for members allowed to use them. \
                 Provide no channels to clear the current `mod channels`.",
            )
            .category("admin")
            .user_capabilities(&["MANAGE_GUILD"])
            .examples(&["setmodchannels #general #off-topic"]),
    ];

    for setting in ChannelSetting::ALL {
        let example = format!("{} #{}", setting.command(), setting.name().replace(' ', "-"));
        definitions.push(
            CommandDefinition::new(setting.command(), Arc::new(SetChannel(setting)))
                .aliases(setting.aliases())
                .usage(format!("{} <channel mention/ID>", setting.command()))
                .description(format!(
                    "Sets the {} text channel for your server. \
                     Provide no channel to clear the current `{}`.",
                    setting.name(),
                    setting.name()
                ))
                .category("admin")
                .user_capabilities(&["MANAGE_GUILD"])
                .examples(&[example.as_str()]),
        );
    }

    for setting in RoleSetting::ALL {
        let example = format!("{} @{}", setting.command(), setting.example_role());
        definitions.push(
            CommandDefinition::new(setting.command(), Arc::new(SetRole(setting)))
                .aliases(setting.aliases())
                .usage(format!("{} <role mention/ID>", setting.command()))
                .description(format!(
                    "{} Provide no role to clear the current `{}`.",
                    setting.summary(),
                    setting.name()
                ))
                .category("admin")
                .user_capabilities(&["MANAGE_GUILD"])
                .examples(&[example.as_str()]),
        );
    }

    definitions
}

/// `old ➔ new`
fn change(old: &str, new: &str) -> String {
    format!("{} {} {}", old, ARROW, new)
}

fn settings_reply(group: &str, setting: &str, field: &str, value: String) -> Reply {
    Reply::new(format!("Settings: `{}`", group))
        .description(format!("The `{}` was successfully updated.", setting))
        .field(field, value, false)
        .tone(Tone::Success)
}

fn current_config(ctx: &CommandContext) -> Result<GuildConfig, CommandError> {
    ctx.services
        .config
        .get(ctx.guild_id)
        .ok_or_else(|| CommandError::failure("Settings are still loading, please try again shortly", None))
}

// ============================================================================
// SETTINGS
// ============================================================================

struct Settings;

impl Settings {
    fn system(config: &GuildConfig) -> Reply {
        let mod_channels = if config.mod_only_channels.is_empty() {
            NONE.to_string()
        } else {
            config
                .mod_only_channels
                .iter()
                .map(|id| channel_mention(*id))
                .collect::<Vec<_>>()
                .join(" ")
        };

        Reply::new("Settings: `System`")
            .field("Prefix", format!("`{}`", config.prefix), true)
            .field("System Channel", mention_or_none(config.system_channel_id, channel_mention), true)
            .field("Admin Role", mention_or_none(config.admin_role_id, role_mention), true)
            .field("Mod Role", mention_or_none(config.mod_role_id, role_mention), true)
            .field("Mute Role", mention_or_none(config.mute_role_id, role_mention), true)
            .field("Auto Role", mention_or_none(config.auto_role_id, role_mention), true)
            .field("Mod Channels", mod_channels, false)
    }

    fn logging(config: &GuildConfig) -> Reply {
        Reply::new("Settings: `Logging`")
            .field("Mod Log", mention_or_none(config.mod_log_channel_id, channel_mention), true)
            .field("Member Log", mention_or_none(config.member_log_channel_id, channel_mention), true)
            .field(
                "Message Edit Log",
                mention_or_none(config.message_edit_log_channel_id, channel_mention),
                true,
            )
            .field(
                "Message Delete Log",
                mention_or_none(config.message_delete_log_channel_id, channel_mention),
                true,
            )
    }
}

#[async_trait]
impl CommandHandler for Settings {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let config = current_config(&ctx)?;

        let mut category = args.join("").to_lowercase();
        if let Some(stripped) = category.strip_suffix("settings") {
            category = stripped.to_string();
        } else if let Some(stripped) = category.strip_suffix("setting") {
            category = stripped.to_string();
        }

        let reply = match category.as_str() {
            "s" | "sys" | "system" => Self::system(&config),
            "l" | "log" | "logs" | "logging" => Self::logging(&config),
            "" => Reply::new("Settings")
                .description(format!(
                    "**More Information:** `{}settings [category]`",
                    config.prefix
                ))
                .field("System", "`7` settings", true)
                .field("Logging", "`4` settings", true),
            _ => {
                return Err(CommandError::invalid(format!(
                    "Please enter a valid settings category, use {}settings for a list",
                    config.prefix
                )))
            }
        };

        ctx.reply(signed(reply.tone(Tone::Info), &ctx)).await?;
        Ok(())
    }
}

// ============================================================================
// PREFIX
// ============================================================================

struct SetPrefix;

#[async_trait]
impl CommandHandler for SetPrefix {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let prefix = args
            .first()
            .ok_or_else(|| CommandError::missing("Please provide a prefix"))?;
        if prefix.chars().count() > MAX_PREFIX_LEN {
            return Err(CommandError::invalid(
                "Please ensure the prefix is no larger than 3 characters",
            ));
        }

        let old = current_config(&ctx)?.prefix;
        ctx.services
            .config
            .update(ctx.guild_id, ConfigUpdate::Prefix(prefix.clone()))
            .await?;

        tracing::info!(guild_id = ctx.guild_id, old = %old, new = %prefix, "Prefix changed");
        let reply = settings_reply(
            "System",
            "prefix",
            "Prefix",
            change(&format!("`{}`", old), &format!("`{}`", prefix)),
        );
        ctx.reply(signed(reply, &ctx)).await?;
        Ok(())
    }
}

// ============================================================================
// CHANNEL SETTINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelSetting {
    System,
    ModLog,
    MemberLog,
    MessageEditLog,
    MessageDeleteLog,
}

impl ChannelSetting {
    const ALL: [ChannelSetting; 5] = [
        ChannelSetting::System,
        ChannelSetting::ModLog,
        ChannelSetting::MemberLog,
        ChannelSetting::MessageEditLog,
        ChannelSetting::MessageDeleteLog,
    ];

    fn command(&self) -> &'static str {
        match self {
            ChannelSetting::System => "setsystemchannel",
            ChannelSetting::ModLog => "setmodlog",
            ChannelSetting::MemberLog => "setmemberlog",
            ChannelSetting::MessageEditLog => "setmessageeditlog",
            ChannelSetting::MessageDeleteLog => "setmessagedeletelog",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            ChannelSetting::System => &["setsc", "ssc"],
            ChannelSetting::ModLog => &["setml", "sml"],
            ChannelSetting::MemberLog => &["setmeml", "smeml"],
            ChannelSetting::MessageEditLog => &["setmsgeditlog", "setmel", "smel"],
            ChannelSetting::MessageDeleteLog => &["setmsgdeletelog", "setmdl", "smdl"],
        }
    }

    /// Name used in descriptions and replies.
    fn name(&self) -> &'static str {
        match self {
            ChannelSetting::System => "system channel",
            ChannelSetting::ModLog => "mod log",
            ChannelSetting::MemberLog => "member log",
            ChannelSetting::MessageEditLog => "message edit log",
            ChannelSetting::MessageDeleteLog => "message delete log",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ChannelSetting::System => "System Channel",
            ChannelSetting::ModLog => "Mod Log",
            ChannelSetting::MemberLog => "Member Log",
            ChannelSetting::MessageEditLog => "Message Edit Log",
            ChannelSetting::MessageDeleteLog => "Message Delete Log",
        }
    }

    fn group(&self) -> &'static str {
        match self {
            ChannelSetting::System => "System",
            _ => "Logging",
        }
    }

    fn current(&self, config: &GuildConfig) -> Option<u64> {
        match self {
            ChannelSetting::System => config.system_channel_id,
            ChannelSetting::ModLog => config.mod_log_channel_id,
            ChannelSetting::MemberLog => config.member_log_channel_id,
            ChannelSetting::MessageEditLog => config.message_edit_log_channel_id,
            ChannelSetting::MessageDeleteLog => config.message_delete_log_channel_id,
        }
    }

    fn update(&self, channel_id: Option<u64>) -> ConfigUpdate {
        match self {
            ChannelSetting::System => ConfigUpdate::SystemChannel(channel_id),
            ChannelSetting::ModLog => ConfigUpdate::ModLogChannel(channel_id),
            ChannelSetting::MemberLog => ConfigUpdate::MemberLogChannel(channel_id),
            ChannelSetting::MessageEditLog => ConfigUpdate::MessageEditLogChannel(channel_id),
            ChannelSetting::MessageDeleteLog => ConfigUpdate::MessageDeleteLogChannel(channel_id),
        }
    }
}

struct SetChannel(ChannelSetting);

#[async_trait]
impl CommandHandler for SetChannel {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let setting = self.0;

        // No argument clears the setting
        let channel_id = match args.first() {
            None => None,
            Some(token) => {
                let id = parse_channel_id(token)
                    .filter(|id| ctx.gateway.channel_accessible(ctx.guild_id, *id))
                    .ok_or_else(|| {
                        CommandError::invalid(
                            "Please mention an accessible text or announcement channel or provide a valid text or announcement channel ID",
                        )
                    })?;
                Some(id)
            }
        };

        let old = setting.current(&current_config(&ctx)?);
        ctx.services
            .config
            .update(ctx.guild_id, setting.update(channel_id))
            .await?;

        let reply = settings_reply(
            setting.group(),
            setting.name(),
            setting.label(),
            change(
                &mention_or_none(old, channel_mention),
                &mention_or_none(channel_id, channel_mention),
            ),
        );
        ctx.reply(signed(reply, &ctx)).await?;
        Ok(())
    }
}

// ============================================================================
// ROLE SETTINGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoleSetting {
    Admin,
    Mod,
    Mute,
    Auto,
}

impl RoleSetting {
    const ALL: [RoleSetting; 4] = [
        RoleSetting::Admin,
        RoleSetting::Mod,
        RoleSetting::Mute,
        RoleSetting::Auto,
    ];

    fn command(&self) -> &'static str {
        match self {
            RoleSetting::Admin => "setadminrole",
            RoleSetting::Mod => "setmodrole",
            RoleSetting::Mute => "setmuterole",
            RoleSetting::Auto => "setautorole",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            RoleSetting::Admin => &["setar", "sar"],
            RoleSetting::Mod => &["setmr", "smr"],
            RoleSetting::Mute => &["setmur", "smur"],
            RoleSetting::Auto => &["setaur", "saur"],
        }
    }

    fn name(&self) -> &'static str {
        match self {
            RoleSetting::Admin => "admin role",
            RoleSetting::Mod => "mod role",
            RoleSetting::Mute => "mute role",
            RoleSetting::Auto => "auto role",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RoleSetting::Admin => "Admin Role",
            RoleSetting::Mod => "Mod Role",
            RoleSetting::Mute => "Mute Role",
            RoleSetting::Auto => "Auto Role",
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            RoleSetting::Admin => "Sets the admin role for your server.",
            RoleSetting::Mod => "Sets the mod role for your server.",
            RoleSetting::Mute => "Sets the role given to muted members.",
            RoleSetting::Auto => "Sets the role all new members receive upon joining.",
        }
    }

    fn example_role(&self) -> &'static str {
        match self {
            RoleSetting::Admin => "Admin",
            RoleSetting::Mod => "Mod",
            RoleSetting::Mute => "Muted",
            RoleSetting::Auto => "Member",
        }
    }

    fn current(&self, config: &GuildConfig) -> Option<u64> {
        match self {
            RoleSetting::Admin => config.admin_role_id,
            RoleSetting::Mod => config.mod_role_id,
            RoleSetting::Mute => config.mute_role_id,
            RoleSetting::Auto => config.auto_role_id,
        }
    }

    fn update(&self, role_id: Option<u64>) -> ConfigUpdate {
        match self {
            RoleSetting::Admin => ConfigUpdate::AdminRole(role_id),
            RoleSetting::Mod => ConfigUpdate::ModRole(role_id),
            RoleSetting::Mute => ConfigUpdate::MuteRole(role_id),
            RoleSetting::Auto => ConfigUpdate::AutoRole(role_id),
        }
    }
}

struct SetRole(RoleSetting);

#[async_trait]
impl CommandHandler for SetRole {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let setting = self.0;

        let role_id = match args.first() {
            None => None,
            Some(token) => {
                let id = parse_role_id(token)
                    .filter(|id| ctx.gateway.role_position(ctx.guild_id, *id).is_some())
                    .ok_or_else(|| {
                        CommandError::invalid("Please mention a role or provide a valid role ID")
                    })?;
                Some(id)
            }
        };

        let old = setting.current(&current_config(&ctx)?);
        ctx.services
            .config
            .update(ctx.guild_id, setting.update(role_id))
            .await?;

        let reply = settings_reply(
            "System",
            setting.name(),
            setting.label(),
            change(
                &mention_or_none(old, role_mention),
                &mention_or_none(role_id, role_mention),
            ),
        );
        ctx.reply(signed(reply, &ctx)).await?;
        Ok(())
    }
}

// ============================================================================
// MOD CHANNELS
// ============================================================================

struct SetModChannels;

#[async_trait]
impl CommandHandler for SetModChannels {
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError> {
        let mut channels: Vec<u64> = Vec::new();
        for token in &args {
            let id = parse_channel_id(token)
                .filter(|id| ctx.gateway.channel_accessible(ctx.guild_id, *id))
                .ok_or_else(|| {
                    CommandError::invalid(
                        "Please mention only accessible text channels or provide only valid text channel IDs",
                    )
                })?;
            if !channels.contains(&id) {
                channels.push(id);
            }
        }

        let render = |ids: &[u64]| {
            if ids.is_empty() {
                NONE.to_string()
            } else {
                ids.iter()
                    .map(|id| channel_mention(*id))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        };

        let old = current_config(&ctx)?.mod_only_channels;
        ctx.services
            .config
            .update(ctx.guild_id, ConfigUpdate::ModOnlyChannels(channels.clone()))
            .await?;

        let reply = Reply::new("Settings: `System`")
            .description("The `mod channels` were successfully updated.")
            .field("Mod Channels", change(&render(&old), &render(&channels)), false)
            .tone(Tone::Success);
        ctx.reply(signed(reply, &ctx)).await?;
        Ok(())
    }
}
