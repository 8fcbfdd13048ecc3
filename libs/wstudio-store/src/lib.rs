pub mod memory;
pub mod redis_store;

pub use memory::MemoryEventStore;
pub use redis_store::{RedisEventStore, RedisTarget};
