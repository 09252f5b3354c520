//! Process-wide callback registry keyed by client identity
//!
//! Each event kind has its own copy-on-write map behind an [`ArcSwap`]. Lookups
//! from native threads are a lock-free snapshot load, so frame delivery for one
//! client never waits on another client's delivery or registration. Writers
//! publish a whole new map atomically; a reader sees either the old or the new
//! map, never a half-written entry.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use color_eyre::Result;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::api::ClientId;
use crate::event::{Disconnect, EventKind, Frame};

/// Frame callback. An `Err` is logged by the trampoline and otherwise ignored.
pub type FrameCallback = Arc<dyn Fn(Frame) -> Result<()> + Send + Sync>;

/// Disconnect callback. An `Err` is logged by the trampoline and otherwise ignored.
pub type DisconnectCallback = Arc<dyn Fn(Disconnect) -> Result<()> + Send + Sync>;

static REGISTRY: Lazy<CallbackRegistry> = Lazy::new(CallbackRegistry::new);

/// The registry the trampolines consult. Lives for the whole process.
pub fn registry() -> &'static CallbackRegistry {
    &REGISTRY
}

struct Slots<T> {
    map: ArcSwap<HashMap<ClientId, T>>,
}

impl<T: Clone> Slots<T> {
    fn new() -> Self {
        Self {
            map: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    fn insert(&self, id: ClientId, value: T) -> Option<T> {
        let prev = self.map.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(id, value.clone());
            next
        });
        prev.get(&id).cloned()
    }

    fn remove(&self, id: ClientId) -> Option<T> {
        if !self.map.load().contains_key(&id) {
            return None;
        }
        let prev = self.map.rcu(|current| {
            let mut next = (**current).clone();
            next.remove(&id);
            next
        });
        prev.get(&id).cloned()
    }

    fn get(&self, id: ClientId) -> Option<T> {
        self.map.load().get(&id).cloned()
    }

    fn contains(&self, id: ClientId) -> bool {
        self.map.load().contains_key(&id)
    }

    fn len(&self) -> usize {
        self.map.load().len()
    }
}

/// Maps each client identity to at most one callback per [`EventKind`].
pub struct CallbackRegistry {
    frame: Slots<FrameCallback>,
    disconnect: Slots<DisconnectCallback>,
}

impl CallbackRegistry {
    /// A fresh, empty registry. The trampolines only use [`registry()`].
    pub fn new() -> Self {
        Self {
            frame: Slots::new(),
            disconnect: Slots::new(),
        }
    }

    /// Stores the frame callback for `id`, returning the one it replaced.
    pub fn register_frame(&self, id: ClientId, callback: FrameCallback) -> Option<FrameCallback> {
        let prev = self.frame.insert(id, callback);
        debug!(client = %id, replaced = prev.is_some(), "frame callback registered");
        prev
    }

    /// Stores the disconnect callback for `id`, returning the one it replaced.
    pub fn register_disconnect(
        &self,
        id: ClientId,
        callback: DisconnectCallback,
    ) -> Option<DisconnectCallback> {
        let prev = self.disconnect.insert(id, callback);
        debug!(client = %id, replaced = prev.is_some(), "disconnect callback registered");
        prev
    }

    pub fn frame_callback(&self, id: ClientId) -> Option<FrameCallback> {
        self.frame.get(id)
    }

    pub fn disconnect_callback(&self, id: ClientId) -> Option<DisconnectCallback> {
        self.disconnect.get(id)
    }

    /// Drops every callback registered for `id`. Returns whether anything was removed.
    pub fn unregister(&self, id: ClientId) -> bool {
        let frame = self.frame.remove(id).is_some();
        let disconnect = self.disconnect.remove(id).is_some();
        if frame || disconnect {
            debug!(client = %id, "callbacks unregistered");
        }
        frame || disconnect
    }

    pub fn contains(&self, kind: EventKind, id: ClientId) -> bool {
        match kind {
            EventKind::Frame => self.frame.contains(id),
            EventKind::Disconnect => self.disconnect.contains(id),
        }
    }

    /// Number of clients with a callback of `kind`.
    pub fn len(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Frame => self.frame.len(),
            EventKind::Disconnect => self.disconnect.len(),
        }
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
