use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use log::{info, warn};

use super::domain::execution_context::{ContextId, ExecutionContext};
use super::domain::inference_session::ModelHandle;
use super::domain::model_kind::ModelKind;
use super::domain::model_loader::ModelLoader;
use crate::shared::error::ModelLoadError;

type CacheKey = (ModelKind, ContextId);

/// Registry of loaded models keyed by `(ModelKind, ContextId)`.
///
/// Concurrent first requests for one key coalesce onto a single load; every
/// caller observes the same handle or the same error. A failed load is
/// removed from the registry so a later request retries it.
pub struct ModelCache {
    loader: Box<dyn ModelLoader>,
    slots: Mutex<HashMap<CacheKey, Arc<ModelSlot>>>,
    loads: AtomicUsize,
}

struct ModelSlot {
    result: Mutex<Option<Result<ModelHandle, ModelLoadError>>>,
    ready: Condvar,
}

impl ModelCache {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Return the handle for `kind` under `context`, loading it on first use.
    pub fn get(
        &self,
        kind: ModelKind,
        context: &ExecutionContext,
    ) -> Result<ModelHandle, ModelLoadError> {
        let key = (kind, context.id());
        let (slot, leader) = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.get(&key) {
                Some(slot) => (slot.clone(), false),
                None => {
                    let slot = Arc::new(ModelSlot::new());
                    slots.insert(key, slot.clone());
                    (slot, true)
                }
            }
        };

        if !leader {
            return slot.wait();
        }

        self.loads.fetch_add(1, Ordering::SeqCst);
        let result = self
            .loader
            .load(kind, context)
            .map(|session| ModelHandle::new(kind, context.id(), session));

        match &result {
            Ok(_) => info!("Loaded {kind} model on {}", context.primary()),
            Err(e) => {
                warn!("{e}");
                self.slots
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&key);
            }
        }
        slot.publish(result.clone());
        result
    }

    /// Drop every cached model that no session still holds.
    pub fn release_unused(&self) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|_, slot| !slot.is_unused());
        let released = before - slots.len();
        if released > 0 {
            info!("Released {released} unused model(s)");
        }
        released
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of loads performed through the loader since construction.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelSlot {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn publish(&self, result: Result<ModelHandle, ModelLoadError>) {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> Result<ModelHandle, ModelLoadError> {
        let mut guard = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(ref result) = *guard {
                return result.clone();
            }
            guard = self
                .ready
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Loaded, and the cache's own handle is the only one left.
    fn is_unused(&self) -> bool {
        match &*self.result.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(Ok(handle)) => handle.holders() == 1,
            _ => false,
        }
    }
}
