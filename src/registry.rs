use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    seen: HashSet<String>,
    order: Vec<String>,
}

/// Thread-safe, append-only set of push recipients (user, group or room IDs).
/// Lives only in memory; a restart starts from empty.
#[derive(Clone, Default)]
pub struct RecipientRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl RecipientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` unless already present. Returns true when it was new.
    pub async fn register(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.seen.insert(id.to_string()) {
            return false;
        }
        inner.order.push(id.to_string());
        true
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of all recipients in insertion order. Callers iterate this
    /// rather than holding the lock across network calls.
    pub async fn snapshot(&self) -> Vec<String> {
        self.inner.lock().await.order.clone()
    }
}
