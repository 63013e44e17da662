//! Page-wide "should animations and media progress run?" signal.
//!
//! Pause requests are tracked by reason string. The state is
//! [`VisibilityState::Paused`] while at least one reason is outstanding and
//! flips back to [`VisibilityState::Active`] only once the last reason is
//! removed, so independent subsystems (tab hidden, a modal overlay, a reduced
//! motion toggle) can pause without clobbering each other.

mod gate;

pub use gate::AnimationGate;

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::contain_callback;

/// Stream of visibility states, starting with the current one.
pub type VisibilityStream = Pin<Box<dyn Stream<Item = VisibilityState> + Send>>;

/// Reason registered while the document is hidden.
pub const DOCUMENT_HIDDEN: &str = "document-hidden";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityState {
    #[default]
    Active,
    Paused,
}

impl VisibilityState {
    pub fn is_active(self) -> bool {
        self == VisibilityState::Active
    }
}

/// Visibility of the whole document as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentVisibility {
    Visible,
    Hidden,
}

type Listener = Arc<dyn Fn(VisibilityState) + Send + Sync>;

struct Shared {
    state: VisibilityState,
    reasons: BTreeSet<Cow<'static, str>>,
    listeners: BTreeMap<u64, Listener>,
    next_listener: u64,
}

pub struct VisibilityBroadcaster {
    shared: Arc<Mutex<Shared>>,
    watch: watch::Sender<VisibilityState>,
}

impl fmt::Debug for VisibilityBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("VisibilityBroadcaster")
            .field("state", &shared.state)
            .field("reasons", &shared.reasons)
            .field("listeners", &shared.listeners.len())
            .finish()
    }
}

impl Default for VisibilityBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityBroadcaster {
    pub fn new() -> Self {
        let (watch, _) = watch::channel(VisibilityState::Active);
        Self {
            shared: Arc::new(Mutex::new(Shared {
                state: VisibilityState::Active,
                reasons: BTreeSet::new(),
                listeners: BTreeMap::new(),
                next_listener: 0,
            })),
            watch,
        }
    }

    pub fn state(&self) -> VisibilityState {
        self.shared.lock().state
    }

    /// Outstanding pause reasons, sorted.
    pub fn reasons(&self) -> Vec<String> {
        self.shared
            .lock()
            .reasons
            .iter()
            .map(|reason| reason.to_string())
            .collect()
    }

    /// Register a listener. It is invoked once immediately with the current
    /// state and then on every transition until the returned [`Subscription`]
    /// is cancelled or dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(VisibilityState) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let (id, state) = {
            let mut shared = self.shared.lock();
            let id = shared.next_listener;
            shared.next_listener += 1;
            shared.listeners.insert(id, Arc::clone(&listener));
            (id, shared.state)
        };
        notify(&listener, state);
        Subscription {
            shared: Arc::downgrade(&self.shared),
            id: Some(id),
        }
    }

    /// Async view of the same state for tasks that prefer awaiting changes.
    pub fn watch(&self) -> watch::Receiver<VisibilityState> {
        self.watch.subscribe()
    }

    /// Stream of state changes. Yields the current state first; intermediate
    /// states may be coalesced when the consumer falls behind. Ends when the
    /// broadcaster is dropped.
    pub fn changes(&self) -> VisibilityStream {
        let receiver = self.watch.subscribe();
        Box::pin(futures::stream::unfold(
            (receiver, true),
            |(mut receiver, first)| async move {
                if !first && receiver.changed().await.is_err() {
                    return None;
                }
                let state = *receiver.borrow_and_update();
                Some((state, (receiver, false)))
            },
        ))
    }

    /// Add a pause reason. Adding a reason that is already outstanding is a
    /// no-op.
    pub fn pause(&self, reason: impl Into<Cow<'static, str>>) {
        let reason = reason.into();
        let listeners = {
            let mut shared = self.shared.lock();
            if !shared.reasons.insert(reason.clone()) {
                return;
            }
            log::debug!("visibility pause requested: {reason}");
            Self::transition(&mut shared, VisibilityState::Paused)
        };
        self.broadcast(listeners, VisibilityState::Paused);
    }

    /// Remove a pause reason. Unknown reasons are ignored.
    pub fn resume(&self, reason: &str) {
        let listeners = {
            let mut shared = self.shared.lock();
            if !shared.reasons.remove(reason) {
                return;
            }
            log::debug!("visibility pause released: {reason}");
            if !shared.reasons.is_empty() {
                return;
            }
            Self::transition(&mut shared, VisibilityState::Active)
        };
        self.broadcast(listeners, VisibilityState::Active);
    }

    /// Translate a platform visibility change into the `document-hidden`
    /// reason.
    pub fn on_document_visibility(&self, visibility: DocumentVisibility) {
        match visibility {
            DocumentVisibility::Hidden => self.pause(DOCUMENT_HIDDEN),
            DocumentVisibility::Visible => self.resume(DOCUMENT_HIDDEN),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared.lock().listeners.len()
    }

    fn transition(shared: &mut Shared, next: VisibilityState) -> Option<Vec<Listener>> {
        if shared.state == next {
            return None;
        }
        shared.state = next;
        Some(shared.listeners.values().cloned().collect())
    }

    fn broadcast(&self, listeners: Option<Vec<Listener>>, state: VisibilityState) {
        let Some(listeners) = listeners else {
            return;
        };
        log::debug!(
            "visibility is now {state:?}; notifying {} listeners",
            listeners.len()
        );
        self.watch.send_replace(state);
        for listener in &listeners {
            notify(listener, state);
        }
    }
}

fn notify(listener: &Listener, state: VisibilityState) {
    contain_callback("visibility listener", || {
        listener(state);
        Ok(())
    });
}

/// Handle returned by [`VisibilityBroadcaster::subscribe`]. Dropping it
/// unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    shared: Weak<Mutex<Shared>>,
    id: Option<u64>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Subscription {
    /// Unsubscribe now. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(id) = self.id.take()
            && let Some(shared) = self.shared.upgrade()
        {
            shared.lock().listeners.remove(&id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some() && self.shared.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
