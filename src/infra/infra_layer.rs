// The infra module contains implementations of core traits.
// Each storage backend goes in its own submodule.

#[path = "memory/mod.rs"]
pub mod memory;

#[path = "sqlite/mod.rs"]
pub mod sqlite;
