//! Redis client probes.

pub mod goredis;
pub mod rueidis;

pub use goredis::GoRedisEvent;
pub use rueidis::RueidisEvent;

const DB_SYSTEM: &str = "redis";
