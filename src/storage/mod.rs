pub mod metadata_cache;

pub use metadata_cache::{MemoryStore, MetadataCache, MetadataStore, RedisStore};
