//! # cx_ratelimit
//!
//! Distributed fixed-window admission control. Counters live in a shared store
//! (Redis in production, [`MemoryCounterStore`] in-process) under keys built by
//! [`key_builder`], and [`UrlPatternRateLimiter`] plugs into a request pipeline as a
//! callback.

pub mod config;
pub mod key_builder;
pub mod memory_store;
pub mod redis_store;
pub mod store;
mod time;
pub mod url_pattern;

pub use config::RateLimitConfig;
pub use key_builder::ParsedKey;
pub use key_builder::RateLimitWindow;
pub use key_builder::DEFAULT_KEY_PREFIX;
pub use memory_store::MemoryCounterStore;
pub use redis_store::RedisCounterStore;
pub use store::SharedCounterStore;
pub use time::TimeSource;
pub use url_pattern::PatternSet;
pub use url_pattern::UrlPatternRateLimiter;
pub use url_pattern::UrlPatternRateLimiterBuilder;
