//! mbus-store
//!
//! Collaborator implementations for the catch-up reconciler:
//! - `MemoryStore`: in-process key-value store with lazy TTL expiry
//! - `MemoryMarker` / `FileMarker`: last-success marker persistence
//! - `RedisStore` (feature `redis`): blocking Redis client

mod marker;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use marker::{FileMarker, MarkerDocument, MemoryMarker};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
