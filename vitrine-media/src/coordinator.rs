//! Page-wide single-active playback registry.
//!
//! Every audio-producing player registers a [`PlaybackHandle`] under its
//! [`PlayerId`]. Activating one player pauses whichever player was active
//! before it, so at most one source is audible at a time.
//!
//! The registry only holds [`Weak`] references: a player that is dropped
//! without unregistering cannot be kept alive by the table and is pruned the
//! next time it is looked up.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::contain_callback;
use crate::ids::PlayerId;

/// Upper bound on pause callbacks one `set_active` call will run while other
/// players keep claiming the slot from inside those callbacks.
const MAX_HANDOFF_ROUNDS: usize = 16;

/// Capabilities a player exposes to the coordinator.
///
/// Callbacks run with the registry unlocked, so implementations may call back
/// into the coordinator (for example to deactivate themselves).
pub trait PlaybackHandle: Send + Sync {
    fn pause(&self) -> anyhow::Result<()>;
    fn destroy(&self) -> anyhow::Result<()>;
}

#[derive(Default)]
struct Registry {
    handles: HashMap<PlayerId, Weak<dyn PlaybackHandle>>,
    active: Option<PlayerId>,
}

impl Registry {
    fn live(&mut self, id: PlayerId) -> Option<Arc<dyn PlaybackHandle>> {
        let handle = self.handles.get(&id).and_then(Weak::upgrade);
        if handle.is_none() && self.handles.remove(&id).is_some() {
            log::debug!("pruned dropped player {id} from playback registry");
            if self.active == Some(id) {
                self.active = None;
            }
        }
        handle
    }
}

#[derive(Default)]
pub struct PlaybackCoordinator {
    registry: Mutex<Registry>,
}

impl fmt::Debug for PlaybackCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("PlaybackCoordinator")
            .field("registered", &registry.handles.len())
            .field("active", &registry.active)
            .finish()
    }
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `id`. Re-registering an id replaces the
    /// previous handle (last writer wins).
    pub fn register<H>(&self, id: PlayerId, handle: &Arc<H>)
    where
        H: PlaybackHandle + 'static,
    {
        let handle: Arc<dyn PlaybackHandle> = handle.clone();
        let weak: Weak<dyn PlaybackHandle> = Arc::downgrade(&handle);
        let replaced = self.registry.lock().handles.insert(id, weak).is_some();
        if replaced {
            log::debug!("player {id} re-registered; previous handle replaced");
        }
    }

    /// Remove `id` from the registry. Clears the active slot without pausing
    /// when `id` was active. Idempotent; returns whether anything was removed.
    pub fn unregister(&self, id: PlayerId) -> bool {
        let mut registry = self.registry.lock();
        if registry.active == Some(id) {
            registry.active = None;
        }
        registry.handles.remove(&id).is_some()
    }

    /// Make `id` the single active player, pausing the previously active one
    /// first. Unknown ids are a no-op and return `false`.
    ///
    /// A pause callback may itself activate another player; that player is
    /// paused in turn before `id` takes the slot.
    pub fn set_active(&self, id: PlayerId) -> bool {
        for _ in 0..MAX_HANDOFF_ROUNDS {
            let previous = {
                let mut registry = self.registry.lock();
                if registry.live(id).is_none() {
                    log::debug!("ignoring activation of unregistered player {id}");
                    return false;
                }
                match registry.active {
                    Some(current) if current == id => return true,
                    None => {
                        registry.active = Some(id);
                        log::trace!("player {id} is now active");
                        return true;
                    }
                    Some(current) => {
                        registry.active = None;
                        registry.live(current).map(|handle| (current, handle))
                    }
                }
            };

            if let Some((prev, handle)) = previous {
                contain_callback(&format!("pause callback of player {prev}"), || {
                    handle.pause()
                });
            }
        }

        log::warn!("player {id} not activated: pause callbacks kept claiming the slot");
        false
    }

    /// Clear the active slot if it currently belongs to `id`. Players call
    /// this when they stop on their own (user pause, natural end).
    pub fn deactivate(&self, id: PlayerId) -> bool {
        let mut registry = self.registry.lock();
        if registry.active == Some(id) {
            registry.active = None;
            true
        } else {
            false
        }
    }

    /// Pause every registered player and clear the active slot.
    pub fn pause_all(&self) {
        let handles = {
            let mut registry = self.registry.lock();
            registry.active = None;
            Self::snapshot(&mut registry)
        };
        for (id, handle) in handles {
            contain_callback(&format!("pause callback of player {id}"), || {
                handle.pause()
            });
        }
    }

    /// Destroy every registered player and empty the registry. Used on page
    /// teardown.
    pub fn destroy_all(&self) {
        let handles = {
            let mut registry = self.registry.lock();
            let handles = Self::snapshot(&mut registry);
            registry.handles.clear();
            registry.active = None;
            handles
        };
        for (id, handle) in handles {
            contain_callback(&format!("destroy callback of player {id}"), || {
                handle.destroy()
            });
        }
    }

    pub fn active(&self) -> Option<PlayerId> {
        self.registry.lock().active
    }

    pub fn is_registered(&self, id: PlayerId) -> bool {
        self.registry.lock().live(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.registry.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(registry: &mut Registry) -> Vec<(PlayerId, Arc<dyn PlaybackHandle>)> {
        registry.handles.retain(|_, weak| weak.strong_count() > 0);
        registry
            .handles
            .iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|handle| (*id, handle)))
            .collect()
    }
}
