//! Session storage
//!
//! Workflow state lives in a local map with an optional durable tier behind
//! it. Reads go through to the durable tier on a local miss, writes go
//! through to it on every `put`.

mod state;
mod store;
mod tier;
#[cfg(feature = "redis_backend")]
mod redis_tier;

pub use state::{Prepared, Session, SessionSummary, TrainedModel};
pub use store::{Durability, SessionStore};
pub use tier::{DurableTier, InMemoryTier};
#[cfg(feature = "redis_backend")]
pub use redis_tier::RedisTier;
