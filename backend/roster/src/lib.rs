//! CRM records and where they live.
//!
//! [`Store`] is the seam between business logic and persistence. The server and
//! the grace job talk to Redis through [`RedisStore`]; tests and dry runs use
//! [`MemoryStore`].

pub mod memory;
pub mod models;
pub mod redis_store;
pub mod store;

pub use memory::MemoryStore;
pub use models::{ActivityPeriod, Client, GracePeriod, GraceStatus, Product};
pub use redis_store::RedisStore;
pub use store::{InsertOutcome, Store, StoreError};
