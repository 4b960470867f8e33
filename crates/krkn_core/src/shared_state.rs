use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;

/// A process-wide key->string singleton (spec §5): thread-safe
/// get/set/delete/snapshot behind a reader-writer lock, mirroring the
/// teacher's `Arc<RwLock<Diagnostics>>` shared-state pattern but
/// generalised into a plain map rather than a typed struct.
pub struct SharedState {
    inner: RwLock<HashMap<String, String>>,
}

static INSTANCE: OnceLock<SharedState> = OnceLock::new();

impl SharedState {
    fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the process-wide singleton, initializing it on first use.
    pub fn global() -> &'static SharedState {
        INSTANCE.get_or_init(SharedState::new)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.write().await.insert(key.into(), value.into());
    }

    pub async fn delete(&self, key: &str) -> Option<String> {
        self.inner.write().await.remove(key)
    }

    /// A deep copy of the current contents.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete_roundtrip() {
        let state = SharedState::new();
        state.set("a", "1").await;
        assert_eq!(state.get("a").await, Some("1".to_string()));
        let snap = state.snapshot().await;
        assert_eq!(snap.get("a"), Some(&"1".to_string()));
        assert_eq!(state.delete("a").await, Some("1".to_string()));
        assert_eq!(state.get("a").await, None);
    }

    #[tokio::test]
    async fn global_is_shared_across_calls() {
        SharedState::global().set("shared", "x").await;
        assert_eq!(SharedState::global().get("shared").await, Some("x".to_string()));
    }
}
