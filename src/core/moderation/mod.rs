// Core moderation module - mod log publishing, target vetting and timed mutes.

pub mod moderation_models;
pub mod modlog;
pub mod mute;
pub mod targets;

pub use moderation_models::*;
pub use modlog::ModerationLogPublisher;
pub use mute::MuteExpiry;
pub use targets::{ensure_actionable, resolve_member};
