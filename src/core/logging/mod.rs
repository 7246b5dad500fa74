// Activity logging - member and message events sent to configured log channels.

pub mod logging_models;
pub mod logging_service;

pub use logging_models::{LogChannelKind, LogEvent, TrackedMessage};
pub use logging_service::ActivityLogPublisher;
