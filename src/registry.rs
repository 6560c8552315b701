//! Time-bounded registry of download links.
//!
//! [`LinkRegistry::register`] stores a manifest under a fresh UUID and
//! schedules its removal; [`LinkRegistry::resolve`] looks it up again until
//! the TTL runs out. Expired and unknown ids look the same to callers.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::manifest::Manifest;

/// How long a registered link stays valid unless configured otherwise.
pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(60);

struct Registered {
    manifest: Arc<Manifest>,
    expires_at: Instant,
}

struct Inner {
    links: DashMap<String, Registered>,
    ttl: Duration,
}

/// Concurrent map from link id to manifest with per-entry expiry.
///
/// Clones share the same map. Each registration spawns its own removal
/// task on the current tokio runtime, so `register` must be called from
/// within one.
#[derive(Clone)]
pub struct LinkRegistry {
    inner: Arc<Inner>,
}

impl LinkRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                links: DashMap::new(),
                ttl,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Store `manifest` and return the id it can be fetched with.
    pub fn register(&self, manifest: Manifest) -> String {
        let id = Uuid::new_v4().to_string();
        let expires_at = Instant::now() + self.inner.ttl;

        self.inner.links.insert(
            id.clone(),
            Registered {
                manifest: Arc::new(manifest),
                expires_at,
            },
        );

        let registry = Arc::downgrade(&self.inner);
        let key = id.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            expire(registry, &key);
        });

        debug!(link_id = %id, ttl_secs = self.inner.ttl.as_secs(), "registered download link");
        id
    }

    /// Look up a link. `None` if it never existed or has expired.
    pub fn resolve(&self, id: &str) -> Option<Arc<Manifest>> {
        let entry = self.inner.links.get(id)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(Arc::clone(&entry.manifest))
    }

    /// Number of entries still held, including any awaiting removal.
    pub fn len(&self) -> usize {
        self.inner.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.links.is_empty()
    }
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_TTL)
    }
}

fn expire(registry: Weak<Inner>, id: &str) {
    let Some(inner) = registry.upgrade() else {
        return;
    };
    if inner
        .links
        .remove_if(id, |_, entry| entry.expires_at <= Instant::now())
        .is_some()
    {
        debug!(link_id = %id, "download link expired");
    }
}
