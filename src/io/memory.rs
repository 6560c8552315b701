use std::collections::HashMap;
use std::io::Cursor;
use std::sync::RwLock;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;

use super::{ObjectReader, ObjectStore};

/// Object store held entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `key` in `bucket`, replacing any previous object
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        let mut objects = self.objects.write().unwrap_or_else(|e| e.into_inner());
        objects.insert((bucket.to_string(), key.to_string()), data.into());
    }

    /// Builder-style variant of [`insert`](Self::insert)
    pub fn with_object(self, bucket: &str, key: &str, data: impl Into<Bytes>) -> Self {
        self.insert(bucket, key, data);
        self
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        let objects = self.objects.read().unwrap_or_else(|e| e.into_inner());
        let data = objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("object {key} not found in bucket {bucket}"))?;
        Ok(Box::new(Cursor::new(data)))
    }
}
