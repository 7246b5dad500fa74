// Command engine: definitions, the registry, the permission gate, cooldowns
// and the dispatcher that ties them together.

pub mod capabilities;
pub mod command_models;
pub mod cooldown;
pub mod dispatcher;
pub mod handler;
pub mod permissions;
pub mod registry;
pub mod replies;

pub use capabilities::{Capability, CapabilitySet};
pub use command_models::{Command, CommandCategory, CommandDefinition};
pub use cooldown::{ActiveCooldown, CooldownTracker};
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use handler::{CommandContext, CommandError, CommandHandler, ErrorKind};
pub use permissions::{OwnerSet, PermissionDecision, PermissionGate};
pub use registry::{CommandRegistry, RegistrationError};
