use crate::error::TributaryError;
use crate::resource::actor::{self, ResourceActorArgs, ResourceDeps, ResourceHandle};
use crate::resource::config::{ResourceRecord, actor_key};
use ahash::AHashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tributary_schema::ProviderKind;

/// Per-key slot; spawning happens under this lock only.
type Slot = Arc<Mutex<Option<ResourceHandle>>>;

/// Routes `(provider, resource id)` to its single live actor.
///
/// The map lock is held only to find or insert a key's slot. Spawning an actor (which loads
/// its record) holds just that key's slot, so different resources start in parallel.
pub struct ResourceRegistry {
    deps: ResourceDeps,
    slots: Mutex<AHashMap<String, Slot>>,
}

impl ResourceRegistry {
    pub fn new(deps: ResourceDeps) -> Self {
        Self {
            deps,
            slots: Mutex::new(AHashMap::new()),
        }
    }

    pub fn deps(&self) -> &ResourceDeps {
        &self.deps
    }

    /// Live actor for the key, spawning it when absent.
    pub async fn get_or_spawn(
        &self,
        kind: ProviderKind,
        resource_id: &str,
    ) -> Result<ResourceHandle, TributaryError> {
        let key = actor_key(kind, resource_id);
        loop {
            let slot = self
                .slots
                .lock()
                .await
                .entry(key.clone())
                .or_default()
                .clone();

            let mut guard = slot.lock().await;
            // The slot may have been evicted while we waited for it.
            if !self.is_current(&key, &slot).await {
                continue;
            }
            if let Some(handle) = guard.as_ref()
                && handle.is_alive()
            {
                return Ok(handle.clone());
            }

            let spawned = actor::spawn(ResourceActorArgs {
                kind,
                resource_id: resource_id.to_string(),
                deps: self.deps.clone(),
            })
            .await;
            return match spawned {
                Ok(handle) => {
                    *guard = Some(handle.clone());
                    Ok(handle)
                }
                Err(e) => {
                    self.remove_if_current(&key, &slot).await;
                    Err(e)
                }
            };
        }
    }

    /// Actor for a resource that has been initialized, without spawning one for unknown keys.
    pub async fn get_initialized(
        &self,
        kind: ProviderKind,
        resource_id: &str,
    ) -> Result<Option<ResourceHandle>, TributaryError> {
        let key = actor_key(kind, resource_id);
        let cached = self.slots.lock().await.get(&key).cloned();
        if let Some(slot) = cached
            && let Some(handle) = slot.lock().await.as_ref()
            && handle.is_alive()
        {
            return Ok(Some(handle.clone()));
        }

        let initialized = match self.deps.db.load_state(&key).await? {
            Some(value) => serde_json::from_value::<ResourceRecord>(value)
                .is_ok_and(|record| record.config.is_initialized()),
            None => false,
        };
        if !initialized {
            return Ok(None);
        }
        self.get_or_spawn(kind, resource_id).await.map(Some)
    }

    /// Stop `handle` and forget its key, unless the key already routes to another actor.
    pub async fn evict(&self, handle: &ResourceHandle) {
        let Some(slot) = self.slots.lock().await.get(handle.key()).cloned() else {
            return;
        };
        let mut guard = slot.lock().await;
        if !guard.as_ref().is_some_and(|current| current.same_actor(handle)) {
            return;
        }
        if let Some(current) = guard.take() {
            current.stop();
        }
        self.remove_if_current(handle.key(), &slot).await;
        debug!(key = %handle.key(), "Resource actor evicted");
    }

    async fn is_current(&self, key: &str, slot: &Slot) -> bool {
        self.slots
            .lock()
            .await
            .get(key)
            .is_some_and(|s| Arc::ptr_eq(s, slot))
    }

    /// Callers hold the slot's lock, so the slot cannot be refilled concurrently.
    async fn remove_if_current(&self, key: &str, slot: &Slot) {
        let mut slots = self.slots.lock().await;
        if slots.get(key).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(key);
        }
    }

    /// Respawn every initialized resource so its persisted timer is re-armed.
    pub async fn restore(&self) -> Result<usize, TributaryError> {
        let states = self.deps.db.list_states().await?;
        let mut restored = 0usize;
        for state in states {
            let record = match serde_json::from_value::<ResourceRecord>(state.record.0) {
                Ok(record) => record,
                Err(e) => {
                    warn!(key = %state.actor_key, "skipping unreadable resource record: {e}");
                    continue;
                }
            };
            if !record.config.is_initialized() {
                continue;
            }
            let config = record.config;
            match self
                .get_or_spawn(config.provider_type, &config.resource_id)
                .await
            {
                Ok(_) => restored += 1,
                Err(e) => warn!(key = %state.actor_key, "failed to restore resource: {e}"),
            }
        }
        info!(restored, "Resource actors restored");
        Ok(restored)
    }

    /// Number of keys currently routed to an actor.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Stop every live actor. Persisted records are left as they are.
    pub async fn shutdown(&self) {
        let slots: Vec<Slot> = self.slots.lock().await.drain().map(|(_, s)| s).collect();
        for slot in slots {
            if let Some(handle) = slot.lock().await.take() {
                handle.stop();
            }
        }
    }
}
