pub mod deferred_actions;

pub use deferred_actions::{
    ActionKind, DeferredActionScheduler, DeferredHandle, DeferredReversal, DeferredTarget,
    SchedulerError,
};
