//! Key-value cache contract for read projections.
//!
//! The cache is never authoritative: everything in it can be rebuilt from the
//! store. The operation set mirrors a Redis subset (hashes, lists, strings,
//! TTL) so a networked backend can slot in behind the same trait.

pub mod memory;

pub use memory::MemoryKv;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Wrong value type at key {0}")]
    WrongType(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait]
pub trait KvCache: Send + Sync {
    /// Replace the hash at `key` with `fields`
    async fn hset_all(&self, key: &str, fields: HashMap<String, String>) -> CacheResult<()>;

    /// All fields of the hash at `key`; empty when missing or expired
    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>>;

    /// Set a time-to-live on an existing key
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()>;

    async fn set(&self, key: &str, value: String) -> CacheResult<()>;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Push onto the head of the list at `key`
    async fn lpush(&self, key: &str, value: String) -> CacheResult<()>;

    /// Inclusive range, head first
    async fn lrange(&self, key: &str, start: usize, stop: usize) -> CacheResult<Vec<String>>;

    /// Remove every element equal to `value`; returns how many were removed
    async fn lrem(&self, key: &str, value: &str) -> CacheResult<usize>;

    /// Keep only the inclusive range `start..=stop`
    async fn ltrim(&self, key: &str, start: usize, stop: usize) -> CacheResult<()>;

    async fn del(&self, key: &str) -> CacheResult<()>;
}

/// Cache key layout, one namespace per lottery
pub mod keys {
    pub fn current_round(lottery_code: &str) -> String {
        format!("lottery:{}:current", lottery_code)
    }

    pub fn history(lottery_code: &str) -> String {
        format!("lottery:{}:history", lottery_code)
    }

    pub fn last_result(lottery_code: &str) -> String {
        format!("lottery:{}:last", lottery_code)
    }
}
