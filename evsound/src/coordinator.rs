//! Playback coordinator
//!
//! Owns the set of in-flight play requests and resolves exactly one
//! [`Outcome`] per request.
//!
//! **Locking:**
//! - `pending` (one mutex) guards the lifecycle state and the
//!   `RequestId -> PendingRequest` map. Resolution is test-and-clear on
//!   that map, so `cancel`, driver notifications and teardown can race on
//!   the same id and only the first one to remove the entry resolves it.
//! - `driver` (rwlock) guards the driver handle. Submissions hold the
//!   read side; teardown takes the write side, so no call reaches a driver
//!   after it was torn down.
//! - Neither lock is held while sending an outcome, and `pending` is never
//!   held while calling into the driver (drivers may notify inline).

use crate::backend::{
    has_sound_source, Driver, DriverFactory, NotificationSink, Notifier, RequestId, Ticket,
};
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::outcome::{Outcome, Playback};
use crate::state::ContextState;
use evsound_common::{ErrorCode, PropertyBag};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Registered request awaiting its outcome
#[derive(Debug)]
struct PendingRequest {
    serial: u64,
    outcome_tx: oneshot::Sender<Outcome>,
}

#[derive(Debug)]
struct PendingTable {
    state: ContextState,
    entries: HashMap<RequestId, PendingRequest>,
}

struct Inner {
    pending: Mutex<PendingTable>,
    driver: RwLock<Option<Box<dyn Driver>>>,
    next_serial: AtomicU64,
    events: EventBus,
}

impl Inner {
    fn lock_pending(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_driver(&self) -> RwLockReadGuard<'_, Option<Box<dyn Driver>>> {
        self.driver.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the entry for `ticket` if it is still the current submission
    fn take_current(&self, ticket: Ticket) -> Option<PendingRequest> {
        let mut table = self.lock_pending();
        match table.entries.get(&ticket.id) {
            Some(entry) if entry.serial == ticket.serial => table.entries.remove(&ticket.id),
            _ => None,
        }
    }

    fn deliver(&self, id: RequestId, request: PendingRequest, outcome: Outcome) {
        debug!("Request {} resolved: {}", id, outcome);
        // Receiver may have been dropped by a caller that stopped caring
        let _ = request.outcome_tx.send(outcome);
        self.events.request_resolved(id, outcome);
    }

    fn set_state(&self, new_state: ContextState) {
        let old_state = {
            let mut table = self.lock_pending();
            std::mem::replace(&mut table.state, new_state)
        };
        if old_state != new_state {
            self.events.state_changed(old_state, new_state);
        }
    }
}

impl NotificationSink for Inner {
    fn on_backend_event(&self, ticket: Ticket, code: ErrorCode) -> bool {
        match self.take_current(ticket) {
            Some(request) => {
                self.deliver(ticket.id, request, Outcome::from_code(code));
                true
            }
            None => {
                debug!(
                    "Discarding notification for {} ({}): no matching pending request",
                    ticket, code
                );
                false
            }
        }
    }
}

/// Tracks in-flight play requests for one context
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Open a driver and build a coordinator bound to it.
    ///
    /// If the driver fails to open, nothing is returned and the partially
    /// built state is dropped.
    pub fn open(factory: &dyn DriverFactory, props: &PropertyBag, events: EventBus) -> Result<Self> {
        let inner = Arc::new(Inner {
            pending: Mutex::new(PendingTable {
                state: ContextState::Active,
                entries: HashMap::new(),
            }),
            driver: RwLock::new(None),
            next_serial: AtomicU64::new(1),
            events,
        });

        let weak = Arc::downgrade(&inner);
        let sink: Weak<dyn NotificationSink> = weak;
        let driver = factory.open(props, Notifier::new(sink)).map_err(|code| {
            warn!("Failed to open driver: {}", code);
            Error::from_code(code)
        })?;

        debug!("Coordinator bound to '{}' driver", driver.name());
        *inner.driver.write().unwrap_or_else(PoisonError::into_inner) = Some(driver);

        Ok(Self { inner })
    }

    /// Name of the bound driver, if not torn down
    pub fn driver_name(&self) -> Option<&'static str> {
        self.inner.read_driver().as_ref().map(|d| d.name())
    }

    pub fn state(&self) -> ContextState {
        self.inner.lock_pending().state
    }

    /// Number of requests awaiting an outcome
    pub fn pending_count(&self) -> usize {
        self.inner.lock_pending().entries.len()
    }

    /// Submit a play request.
    ///
    /// The request is registered before it is forwarded to the driver, so
    /// `playing(id)` is true as soon as this returns (unless the driver
    /// already finished it). Synchronous failures withdraw the request and
    /// are returned here; everything after that arrives through the
    /// returned [`Playback`].
    pub fn play(&self, id: RequestId, props: &PropertyBag) -> Result<Playback> {
        if !has_sound_source(props) {
            return Err(Error::Invalid(
                "play requires event.id or media.filename".to_string(),
            ));
        }

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let ticket = {
            let mut table = self.inner.lock_pending();
            if !table.state.is_active() {
                return Err(Error::Destroyed);
            }
            if table.entries.contains_key(&id) {
                return Err(Error::AlreadyPending(id));
            }
            let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
            table.entries.insert(id, PendingRequest { serial, outcome_tx });
            // Published under the lock so it precedes any resolution
            self.inner.events.request_submitted(id, props.event_id());
            Ticket { id, serial }
        };

        debug!("Submitting request {} ({:?})", ticket, props.event_id());

        let submitted = match self.inner.read_driver().as_ref() {
            Some(driver) => driver.play(ticket, props),
            None => Err(ErrorCode::Destroyed),
        };

        if let Err(code) = submitted {
            // Withdraw unless something else (teardown) already resolved it,
            // in which case the caller gets that outcome instead
            if self.inner.take_current(ticket).is_some() {
                debug!("Request {} rejected by driver: {}", ticket, code);
                self.inner.events.request_rejected(id, code);
                return Err(Error::from_code(code));
            }
        }

        Ok(Playback::new(id, outcome_rx))
    }

    /// Cancel a pending request.
    ///
    /// Returns true if this call resolved the request as canceled, false if
    /// there was nothing to cancel (unknown id, already resolved, or lost
    /// the race against the driver's own notification).
    pub fn cancel(&self, id: RequestId) -> Result<bool> {
        let request = {
            let mut table = self.inner.lock_pending();
            match table.state {
                ContextState::Destroyed => return Err(Error::Destroyed),
                // Teardown is already canceling everything
                ContextState::Destroying => return Ok(false),
                ContextState::Active => table.entries.remove(&id),
            }
        };

        let Some(request) = request else {
            debug!("Cancel for request {}: nothing pending", id);
            return Ok(false);
        };

        let ticket = Ticket {
            id,
            serial: request.serial,
        };
        self.inner.deliver(id, request, Outcome::Canceled);

        if let Some(driver) = self.inner.read_driver().as_ref() {
            driver.cancel(ticket);
        }
        Ok(true)
    }

    /// Whether `id` currently has a pending request
    pub fn playing(&self, id: RequestId) -> Result<bool> {
        let table = self.inner.lock_pending();
        if table.state == ContextState::Destroyed {
            return Err(Error::Destroyed);
        }
        Ok(table.entries.contains_key(&id))
    }

    /// Ask the driver to pre-load a sample. No outcome tracking.
    pub fn cache(&self, props: &PropertyBag) -> Result<()> {
        if props.event_id().is_none() {
            return Err(Error::Invalid("cache requires event.id".to_string()));
        }
        if !self.state().is_active() {
            return Err(Error::Destroyed);
        }

        match self.inner.read_driver().as_ref() {
            Some(driver) => driver.cache(props).map_err(|code| {
                debug!("Cache of {:?} failed: {}", props.event_id(), code);
                Error::from_code(code)
            }),
            None => Err(Error::Destroyed),
        }
    }

    /// Forward updated context-level properties to the driver
    pub fn change_props(&self, props: &PropertyBag) -> Result<()> {
        if !self.state().is_active() {
            return Err(Error::Destroyed);
        }
        match self.inner.read_driver().as_ref() {
            Some(driver) => driver.change_props(props).map_err(Error::from_code),
            None => Err(Error::Destroyed),
        }
    }

    /// Driver entry point for terminal states
    pub fn on_backend_event(&self, ticket: Ticket, code: ErrorCode) -> bool {
        self.inner.on_backend_event(ticket, code)
    }

    /// Tear down: reject new work, cancel everything pending, release the
    /// driver.
    ///
    /// Returns the number of requests that were canceled. Fails with
    /// `Destroyed` if teardown already started.
    pub fn shutdown(&self) -> Result<usize> {
        let drained: Vec<(RequestId, PendingRequest)> = {
            let mut table = self.inner.lock_pending();
            if !table.state.is_active() {
                return Err(Error::Destroyed);
            }
            table.state = ContextState::Destroying;
            table.entries.drain().collect()
        };
        self.inner
            .events
            .state_changed(ContextState::Active, ContextState::Destroying);

        let count = drained.len();
        if count > 0 {
            info!("Canceling {} pending request(s) on teardown", count);
        }

        let mut tickets = Vec::with_capacity(count);
        for (id, request) in drained {
            tickets.push(Ticket {
                id,
                serial: request.serial,
            });
            self.inner.deliver(id, request, Outcome::Canceled);
        }

        // Waits for in-flight submissions holding the read side
        let driver = self
            .inner
            .driver
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(driver) = driver {
            for ticket in tickets {
                driver.cancel(ticket);
            }
            let name = driver.name();
            driver.teardown();
            debug!("Driver '{}' released", name);
        }

        self.inner.set_state(ContextState::Destroyed);
        Ok(count)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.inner.lock_pending();
        f.debug_struct("Coordinator")
            .field("state", &table.state)
            .field("pending", &table.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DriverResult, NullDriverFactory};
    use uuid::Uuid;

    /// Driver that accepts everything and never finishes on its own
    struct SilentDriver;

    impl Driver for SilentDriver {
        fn name(&self) -> &'static str {
            "silent"
        }
        fn play(&self, _ticket: Ticket, _props: &PropertyBag) -> DriverResult<()> {
            Ok(())
        }
        fn cancel(&self, _ticket: Ticket) {}
        fn cache(&self, _props: &PropertyBag) -> DriverResult<()> {
            Ok(())
        }
        fn change_props(&self, _props: &PropertyBag) -> DriverResult<()> {
            Ok(())
        }
        fn teardown(self: Box<Self>) {}
    }

    struct SilentFactory;

    impl DriverFactory for SilentFactory {
        fn open(&self, _props: &PropertyBag, _notifier: Notifier) -> DriverResult<Box<dyn Driver>> {
            Ok(Box::new(SilentDriver))
        }
    }

    fn coordinator(factory: &dyn DriverFactory) -> Coordinator {
        Coordinator::open(factory, &PropertyBag::new(), EventBus::new(Uuid::new_v4(), 16)).unwrap()
    }

    fn bell() -> PropertyBag {
        PropertyBag::builder().event_id("bell").build().unwrap()
    }

    #[test]
    fn test_play_registers_before_returning() {
        let coord = coordinator(&SilentFactory);
        let _playback = coord.play(1, &bell()).unwrap();
        assert!(coord.playing(1).unwrap());
        assert_eq!(coord.pending_count(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let coord = coordinator(&SilentFactory);
        let _first = coord.play(1, &bell()).unwrap();
        let second = coord.play(1, &bell());
        assert!(matches!(second, Err(Error::AlreadyPending(1))));
        assert_eq!(coord.pending_count(), 1);
    }

    #[test]
    fn test_play_requires_sound_source() {
        let coord = coordinator(&SilentFactory);
        let result = coord.play(1, &PropertyBag::new());
        assert_eq!(result.unwrap_err().code(), ErrorCode::Invalid);
        assert_eq!(coord.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_null_driver_completes_inline() {
        let coord = coordinator(&NullDriverFactory);
        let playback = coord.play(5, &bell()).unwrap();
        assert!(!coord.playing(5).unwrap());
        assert_eq!(playback.await, Outcome::Success);
    }

    #[tokio::test]
    async fn test_stale_notification_ignored_after_reuse() {
        let coord = coordinator(&SilentFactory);

        let first = coord.play(2, &bell()).unwrap();
        assert!(coord.cancel(2).unwrap());
        assert_eq!(first.await, Outcome::Canceled);

        let second = coord.play(2, &bell()).unwrap();
        // Late notification for the first submission (serial 1)
        assert!(!coord.on_backend_event(Ticket { id: 2, serial: 1 }, ErrorCode::Success));
        assert!(coord.playing(2).unwrap());

        assert!(coord.on_backend_event(Ticket { id: 2, serial: 2 }, ErrorCode::Io));
        assert_eq!(second.await, Outcome::Failure(ErrorCode::Io));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_and_rejects() {
        let coord = coordinator(&SilentFactory);
        let a = coord.play(1, &bell()).unwrap();
        let b = coord.play(2, &bell()).unwrap();

        assert_eq!(coord.shutdown().unwrap(), 2);
        assert_eq!(coord.state(), ContextState::Destroyed);
        assert_eq!(a.await, Outcome::Canceled);
        assert_eq!(b.await, Outcome::Canceled);

        assert!(matches!(coord.play(3, &bell()), Err(Error::Destroyed)));
        assert!(matches!(coord.cancel(1), Err(Error::Destroyed)));
        assert!(matches!(coord.playing(1), Err(Error::Destroyed)));
        assert!(matches!(coord.shutdown(), Err(Error::Destroyed)));
        assert_eq!(coord.driver_name(), None);
    }
}
