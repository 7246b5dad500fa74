// In-memory storage, no persistence.

mod in_memory_store;

pub use in_memory_store::InMemoryGuildStore;
