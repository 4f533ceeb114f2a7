use super::{CacheError, CacheResult, KvCache};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process cache with Redis-like semantics and lazy expiry
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn live<'a>(entries: &'a HashMap<String, Entry>, key: &str) -> Option<&'a Entry> {
        entries.get(key).filter(|e| e.is_live(Instant::now()))
    }

    fn purge_if_expired(entries: &mut HashMap<String, Entry>, key: &str) {
        if entries.get(key).map_or(false, |e| !e.is_live(Instant::now())) {
            entries.remove(key);
        }
    }
}

#[async_trait]
impl KvCache for MemoryKv {
    async fn hset_all(&self, key: &str, fields: HashMap<String, String>) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        Self::purge_if_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(Entry { value: Value::Hash(hash), .. }) => {
                *hash = fields;
            }
            Some(_) => return Err(CacheError::WrongType(key.to_string())),
            None => {
                entries.insert(key.to_string(), Entry::new(Value::Hash(fields)));
            }
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let entries = self.entries.read().await;
        match Self::live(&entries, key) {
            Some(Entry { value: Value::Hash(hash), .. }) => Ok(hash.clone()),
            Some(_) => Err(CacheError::WrongType(key.to_string())),
            None => Ok(HashMap::new()),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn set(&self, key: &str, value: String) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), Entry::new(Value::Str(value)));
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self.entries.read().await;
        match Self::live(&entries, key) {
            Some(Entry { value: Value::Str(s), .. }) => Ok(Some(s.clone())),
            Some(_) => Err(CacheError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    async fn lpush(&self, key: &str, value: String) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        Self::purge_if_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(Entry { value: Value::List(list), .. }) => list.push_front(value),
            Some(_) => return Err(CacheError::WrongType(key.to_string())),
            None => {
                let mut list = VecDeque::new();
                list.push_front(value);
                entries.insert(key.to_string(), Entry::new(Value::List(list)));
            }
        }
        Ok(())
    }

    async fn lrange(&self, key: &str, start: usize, stop: usize) -> CacheResult<Vec<String>> {
        let entries = self.entries.read().await;
        match Self::live(&entries, key) {
            Some(Entry { value: Value::List(list), .. }) => Ok(list
                .iter()
                .skip(start)
                .take(stop.saturating_sub(start).saturating_add(1))
                .cloned()
                .collect()),
            Some(_) => Err(CacheError::WrongType(key.to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn lrem(&self, key: &str, value: &str) -> CacheResult<usize> {
        let mut entries = self.entries.write().await;
        Self::purge_if_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(Entry { value: Value::List(list), .. }) => {
                let before = list.len();
                list.retain(|v| v != value);
                Ok(before - list.len())
            }
            Some(_) => Err(CacheError::WrongType(key.to_string())),
            None => Ok(0),
        }
    }

    async fn ltrim(&self, key: &str, start: usize, stop: usize) -> CacheResult<()> {
        let mut entries = self.entries.write().await;
        Self::purge_if_expired(&mut entries, key);
        match entries.get_mut(key) {
            Some(Entry { value: Value::List(list), .. }) => {
                let kept: VecDeque<String> = list
                    .iter()
                    .skip(start)
                    .take(stop.saturating_sub(start).saturating_add(1))
                    .cloned()
                    .collect();
                *list = kept;
                Ok(())
            }
            Some(_) => Err(CacheError::WrongType(key.to_string())),
            None => Ok(()),
        }
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
