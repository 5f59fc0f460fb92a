use std::sync::{Arc, Mutex};

use tracing::debug;

use super::base::Adapter;
use super::configs::Settings;
use super::factory::build_adapter;
use crate::errors::Result;

/// Lifecycle manager for the active adapter.
///
/// Per configured name the state machine is `unloaded -> active` on first
/// use and back to `unloaded` on `reload` or `unload`. Reload never mutates
/// a live instance: the factory constructs a fresh adapter and the `Arc` is
/// swapped, so requests that captured the previous instance finish against
/// it undisturbed.
pub struct AdapterRegistry {
    settings: Mutex<Settings>,
    active: Mutex<Option<Arc<dyn Adapter>>>,
}

impl AdapterRegistry {
    pub fn new(settings: Settings) -> Self {
        AdapterRegistry {
            settings: Mutex::new(settings),
            active: Mutex::new(None),
        }
    }

    /// The active adapter, constructed lazily from current settings.
    pub fn active(&self) -> Result<Arc<dyn Adapter>> {
        let mut active = self.active.lock().expect("registry lock poisoned");
        if let Some(adapter) = active.as_ref() {
            return Ok(Arc::clone(adapter));
        }

        let settings = self.settings.lock().expect("registry lock poisoned");
        let adapter = build_adapter(&settings)?;
        debug!(adapter = adapter.name(), "adapter loaded");
        *active = Some(Arc::clone(&adapter));
        Ok(adapter)
    }

    /// Replace the settings and drop the active instance; the next request
    /// constructs a new adapter from the new settings.
    pub fn reload(&self, settings: Settings) {
        let mut current = self.settings.lock().expect("registry lock poisoned");
        *current = settings;
        drop(current);
        self.unload();
    }

    /// Drop the active instance without touching settings.
    pub fn unload(&self) {
        let mut active = self.active.lock().expect("registry lock poisoned");
        if let Some(adapter) = active.take() {
            debug!(adapter = adapter.name(), "adapter unloaded");
        }
    }

    /// Whether an adapter instance is currently constructed.
    pub fn is_loaded(&self) -> bool {
        self.active.lock().expect("registry lock poisoned").is_some()
    }
}
