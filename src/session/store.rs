//! Injectable session container.
//!
//! DESIGN
//! ======
//! One `SessionStore` per application (or per test). Consumers hold clones;
//! all clones share the same state through an `Arc`.
//!
//! Every `begin` bumps a generation counter and hands back a `FlowTicket`.
//! `settle` applies a terminal event only when its ticket is still current,
//! so the most recently begun flow wins and a stale `LoginSuccess` cannot
//! re-authenticate after a newer flow started. Stale terminal events are
//! still published (flagged `stale`) so each flow's Begin/terminal pair stays
//! observable.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};

use super::{Event, SessionState, SessionStatus};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Proof that a flow has begun; required to settle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a begun flow must be settled"]
pub struct FlowTicket {
    generation: u64,
}

impl FlowTicket {
    #[must_use]
    pub fn generation(self) -> u64 {
        self.generation
    }
}

/// An event as published to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Generation of the flow the event belongs to.
    pub generation: u64,
    pub event: Event,
    /// `true` when the event arrived after a newer flow began and was not applied.
    pub stale: bool,
}

struct Slot {
    state: SessionState,
    generation: u64,
}

struct Inner {
    slot: Mutex<Slot>,
    changes: watch::Sender<SessionState>,
    events: broadcast::Sender<Dispatch>,
}

/// Shared, injectable holder of the current [`SessionState`].
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Create a store in the `Anonymous` state.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = watch::channel(SessionState::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot { state: SessionState::default(), generation: 0 }),
                changes,
                events,
            }),
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.lock().state.status()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    /// Generation of the most recently begun flow (0 before any flow).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Receiver that observes every applied state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.changes.subscribe()
    }

    /// Receiver for every dispatched event, including stale terminal events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Dispatch> {
        self.inner.events.subscribe()
    }

    /// Start a flow: apply its `*Begin` event and supersede any in-flight flow.
    ///
    /// # Panics
    ///
    /// Panics if `event` is not a `*Begin` event. Passing a terminal event here
    /// is a programming error, not a runtime condition.
    pub fn begin(&self, event: Event) -> FlowTicket {
        assert!(event.is_begin(), "begin() called with terminal event {}", event.name());
        let mut slot = self.lock();
        slot.generation += 1;
        let generation = slot.generation;
        self.apply_locked(&mut slot, generation, event);
        FlowTicket { generation }
    }

    /// Finish a flow with its terminal event.
    ///
    /// Returns the new state when `ticket` is still current. Returns `None`
    /// when a newer flow has begun; the event is then published as stale and
    /// not applied. Callers run side effects (persisting tokens) only on
    /// `Some`, after the store lock is released.
    ///
    /// # Panics
    ///
    /// Panics if `event` is a `*Begin` event.
    #[must_use = "a superseded flow must not run its side effects"]
    pub fn settle(&self, ticket: FlowTicket, event: Event) -> Option<SessionState> {
        assert!(!event.is_begin(), "settle() called with begin event {}", event.name());
        let mut slot = self.lock();
        if slot.generation != ticket.generation {
            tracing::debug!(
                event = event.name(),
                generation = ticket.generation,
                current = slot.generation,
                "discarding stale session event"
            );
            let _ = self.inner.events.send(Dispatch { generation: ticket.generation, event, stale: true });
            return None;
        }
        self.apply_locked(&mut slot, ticket.generation, event);
        Some(slot.state.clone())
    }

    fn apply_locked(&self, slot: &mut Slot, generation: u64, event: Event) {
        let current = std::mem::take(&mut slot.state);
        slot.state = current.apply(event.clone());
        self.inner.changes.send_replace(slot.state.clone());
        // No subscribers is fine; the event is still applied.
        let _ = self.inner.events.send(Dispatch { generation, event, stale: false });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.lock();
        f.debug_struct("SessionStore")
            .field("status", &slot.state.status())
            .field("generation", &slot.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
