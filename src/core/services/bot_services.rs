// Shared services handed to every command and event handler.
//
// Built once in `main` and passed around as `Arc<BotServices>`; nothing in
// here is a process-wide singleton.

use crate::core::commands::{CommandRegistry, OwnerSet};
use crate::core::config::ConfigService;
use crate::core::logging::ActivityLogPublisher;
use crate::core::moderation::ModerationLogPublisher;
use crate::core::scheduler::DeferredActionScheduler;
use crate::core::store::{MembershipStore, WarnStore};
use std::sync::Arc;

pub struct BotServices {
    pub owners: OwnerSet,
    /// Populated at startup, read-only afterwards.
    pub registry: Arc<CommandRegistry>,
    pub config: Arc<ConfigService>,
    pub warns: Arc<dyn WarnStore>,
    pub members: Arc<dyn MembershipStore>,
    pub scheduler: DeferredActionScheduler,
    pub modlog: ModerationLogPublisher,
    pub activity: ActivityLogPublisher,
}

impl BotServices {
    pub fn new(
        owners: OwnerSet,
        registry: CommandRegistry,
        config: Arc<ConfigService>,
        warns: Arc<dyn WarnStore>,
        members: Arc<dyn MembershipStore>,
    ) -> Self {
        Self {
            owners,
            registry: Arc::new(registry),
            modlog: ModerationLogPublisher::new(Arc::clone(&config)),
            activity: ActivityLogPublisher::new(Arc::clone(&config)),
            config,
            warns,
            members,
            scheduler: DeferredActionScheduler::new(),
        }
    }
}
