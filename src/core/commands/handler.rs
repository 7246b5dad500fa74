// The handler contract - what a command body receives and what it may fail with.

use super::command_models::Command;
use crate::core::gateway::{Gateway, GatewayError, InboundMessage, MessageHandle, Reply};
use crate::core::services::BotServices;
use crate::core::store::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// The kinds of error a reply can report. The labels are what users see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingArgument,
    InvalidArgument,
    CommandFailure,
    MissingBotPermission,
    MissingUserPermission,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::MissingArgument => "Missing Argument",
            ErrorKind::InvalidArgument => "Invalid Argument",
            ErrorKind::CommandFailure => "Command Failure",
            ErrorKind::MissingBotPermission => "Missing Bot Permissions",
            ErrorKind::MissingUserPermission => "Missing User Permissions",
        }
    }

    /// Input errors get usage and examples attached to the reply.
    pub fn is_input_error(&self) -> bool {
        matches!(self, ErrorKind::MissingArgument | ErrorKind::InvalidArgument)
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Command failed: {summary}")]
    Failure {
        summary: String,
        diagnostic: Option<String>,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommandError {
    pub fn missing(detail: impl Into<String>) -> Self {
        CommandError::MissingArgument(detail.into())
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        CommandError::InvalidArgument(detail.into())
    }

    pub fn failure(summary: impl Into<String>, diagnostic: Option<String>) -> Self {
        CommandError::Failure {
            summary: summary.into(),
            diagnostic,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::MissingArgument(_) => ErrorKind::MissingArgument,
            CommandError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CommandError::Failure { .. } | CommandError::Gateway(_) | CommandError::Store(_) => {
                ErrorKind::CommandFailure
            }
        }
    }

    /// The user-facing line. Gateway and store errors are summarised; their
    /// details go in the diagnostic and the server log.
    pub fn detail(&self) -> String {
        match self {
            CommandError::MissingArgument(detail) | CommandError::InvalidArgument(detail) => {
                detail.clone()
            }
            CommandError::Failure { summary, .. } => summary.clone(),
            CommandError::Gateway(_) => "The platform rejected the request".to_string(),
            CommandError::Store(_) => "Please try again in a few seconds".to_string(),
        }
    }

    pub fn diagnostic(&self) -> Option<String> {
        match self {
            CommandError::Failure { diagnostic, .. } => diagnostic.clone(),
            CommandError::Gateway(err) => Some(err.to_string()),
            CommandError::Store(err) => Some(err.to_string()),
            _ => None,
        }
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Everything a handler gets to work with. Owned and cheap to clone so a
/// handler can move it into spawned tasks (menus, deferred actions).
#[derive(Clone)]
pub struct CommandContext {
    pub message: InboundMessage,
    pub guild_id: u64,
    pub command: Arc<Command>,
    /// The prefix in effect for this guild when the command was invoked.
    pub prefix: String,
    pub gateway: Arc<dyn Gateway>,
    pub services: Arc<BotServices>,
}

impl CommandContext {
    pub fn author_id(&self) -> u64 {
        self.message.author_id
    }

    pub fn channel_id(&self) -> u64 {
        self.message.channel_id
    }

    pub fn is_owner(&self) -> bool {
        self.services.owners.contains(self.author_id())
    }

    /// Send a reply to the invoking channel.
    pub async fn reply(&self, reply: Reply) -> Result<MessageHandle, CommandError> {
        Ok(self.gateway.send(self.channel_id(), reply).await?)
    }
}

// ============================================================================
// HANDLER TRAIT
// ============================================================================

#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run the command. `args` is the message split on spaces, without the
    /// prefix and command token.
    async fn run(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), CommandError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_are_reported_as_command_failures() {
        let err = CommandError::from(GatewayError::MissingAccess("Missing Permissions".into()));
        assert_eq!(err.kind(), ErrorKind::CommandFailure);
        assert_eq!(
            err.diagnostic().as_deref(),
            Some("Missing access: Missing Permissions")
        );
    }

    #[test]
    fn input_errors_carry_their_detail() {
        let err = CommandError::invalid("Please mention a user or provide a valid user ID");
        assert!(err.kind().is_input_error());
        assert_eq!(err.detail(), "Please mention a user or provide a valid user ID");
        assert!(err.diagnostic().is_none());
    }
}
