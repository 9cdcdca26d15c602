//! Keyed engine registry for concurrent callers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::engine::Engine;

/// Shared handle to one conversation's engine. Lock it for the duration of a
/// run; the engine itself has no internal locking.
pub type EngineHandle = Arc<Mutex<Engine>>;

/// Maps conversation keys to engine handles. Two callers acquiring the same
/// key get the same handle and serialize on its mutex; distinct keys run
/// concurrently.
#[derive(Default)]
pub struct Sessions {
    engines: Mutex<HashMap<String, EngineHandle>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the engine for `key`, creating it with `make` on first use.
    pub async fn acquire<F>(&self, key: &str, make: F) -> EngineHandle
    where
        F: FnOnce() -> Engine,
    {
        let mut engines = self.engines.lock().await;
        engines
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(make())))
            .clone()
    }

    /// Drop the engine for `key`. In-flight holders of the handle keep it
    /// alive until they release it.
    pub async fn remove(&self, key: &str) -> Option<EngineHandle> {
        self.engines.lock().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.engines.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.engines.lock().await.is_empty()
    }
}
