// libs/appointment-cell/src/services/consistency.rs
//
// Per-slot mutual exclusion for booking and status changes. Requests on
// different slot keys never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::models::SlotKey;

type SlotMutex = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
pub struct SlotLockRegistry {
    locks: Arc<Mutex<HashMap<SlotKey, SlotMutex>>>,
}

impl SlotLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Access is released when the guard
    /// is dropped, including when the holding future is cancelled.
    pub async fn acquire(&self, key: SlotKey) -> SlotLockGuard {
        let slot_mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key).or_default().clone()
        };

        let guard = slot_mutex.clone().lock_owned().await;
        debug!("Acquired slot lock {}", key);

        SlotLockGuard {
            key,
            guard: Some(guard),
            slot_mutex,
            registry: Arc::clone(&self.locks),
        }
    }

    /// Keys that currently have a holder or waiters.
    pub fn held_keys(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

pub struct SlotLockGuard {
    key: SlotKey,
    guard: Option<OwnedMutexGuard<()>>,
    slot_mutex: SlotMutex,
    registry: Arc<Mutex<HashMap<SlotKey, SlotMutex>>>,
}

impl Drop for SlotLockGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        // Registry entry + this guard's handle; anything more means waiters.
        if Arc::strong_count(&self.slot_mutex) <= 2 {
            locks.remove(&self.key);
        }
        debug!("Released slot lock {}", self.key);
    }
}
