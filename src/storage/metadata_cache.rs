use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::core::{AppConfig, BillBlockResult};
use crate::models::InvoiceMetadata;

/// Plain key-value store the metadata cache is persisted in.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, key: &str) -> BillBlockResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> BillBlockResult<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get(&self, key: &str) -> BillBlockResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> BillBlockResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Redis-backed store with an in-process read-through layer in front.
pub struct RedisStore {
    memory: MemoryStore,
    redis: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> BillBlockResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = redis::aio::ConnectionManager::new(client).await?;

        Ok(RedisStore {
            memory: MemoryStore::new(),
            redis,
        })
    }
}

#[async_trait]
impl MetadataStore for RedisStore {
    async fn get(&self, key: &str) -> BillBlockResult<Option<String>> {
        // 1. Check memory
        if let Some(value) = self.memory.get(key).await? {
            return Ok(Some(value));
        }

        // 2. Check Redis
        let mut redis = self.redis.clone();
        let value: Option<String> = redis.get(key).await?;
        if let Some(ref value) = value {
            self.memory.set(key, value.clone()).await?;
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> BillBlockResult<()> {
        let mut redis = self.redis.clone();
        redis.set::<_, _, ()>(key, value.clone()).await?;
        self.memory.set(key, value).await
    }
}

/// Invoice metadata keyed by invoice id, namespaced per contract deployment
/// so two deployments never read each other's entries.
#[derive(Clone)]
pub struct MetadataCache {
    store: Arc<dyn MetadataStore>,
    prefix: String,
}

impl MetadataCache {
    pub fn new(store: Arc<dyn MetadataStore>, prefix: impl Into<String>) -> Self {
        MetadataCache {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn in_memory(prefix: impl Into<String>) -> Self {
        MetadataCache::new(Arc::new(MemoryStore::new()), prefix)
    }

    /// Redis when `REDIS_URL` is configured, memory otherwise.
    pub async fn from_config(config: &AppConfig) -> BillBlockResult<Self> {
        let store: Arc<dyn MetadataStore> = match &config.redis_url {
            Some(url) => {
                tracing::info!("Metadata cache backed by Redis");
                Arc::new(RedisStore::connect(url).await?)
            }
            None => {
                tracing::info!("Metadata cache held in memory");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(MetadataCache::new(store, config.cache_prefix()))
    }

    pub fn key(&self, invoice_id: u64) -> String {
        format!("{}:{}", self.prefix, invoice_id)
    }

    pub async fn get(&self, invoice_id: u64) -> BillBlockResult<Option<InvoiceMetadata>> {
        match self.store.get(&self.key(invoice_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, invoice_id: u64, metadata: &InvoiceMetadata) -> BillBlockResult<()> {
        let serialized = serde_json::to_string(metadata)?;
        self.store.set(&self.key(invoice_id), serialized).await
    }
}
