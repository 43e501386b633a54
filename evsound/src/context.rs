//! Sound context
//!
//! A [`Context`] owns one backend driver and the coordinator tracking its
//! play requests. Every context is an explicit handle; there is no
//! process-wide default context.
//!
//! Lifecycle: `Active -> Destroying -> Destroyed`. Destroying a context
//! resolves every pending request as canceled before the driver is
//! released. Dropping an active context destroys it.

use crate::backend::{factory_for, DriverFactory, RequestId};
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::events::{ContextEvent, EventBus, EVENT_CAPACITY};
use crate::outcome::Playback;
use crate::state::ContextState;
use evsound_common::config::TomlConfig;
use evsound_common::PropertyBag;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct Context {
    id: Uuid,
    props: Mutex<PropertyBag>,
    coordinator: Coordinator,
    events: EventBus,
}

impl Context {
    /// Open a driver with the application-level properties and build a
    /// context around it.
    ///
    /// Driver open failures (`NoDriver`, `System`, ...) are returned here;
    /// no partially constructed context escapes.
    pub fn create(props: PropertyBag, factory: &dyn DriverFactory) -> Result<Self> {
        let id = Uuid::new_v4();
        let events = EventBus::new(id, EVENT_CAPACITY);
        let coordinator = Coordinator::open(factory, &props, events.clone())?;

        info!(
            "Context {} created ({} driver, application {:?})",
            id,
            coordinator.driver_name().unwrap_or("?"),
            props.get_str(evsound_common::props::keys::APPLICATION_NAME)
        );

        Ok(Self {
            id,
            props: Mutex::new(props),
            coordinator,
            events,
        })
    }

    /// Create from bootstrap config: driver from `[driver]`, application
    /// properties from `[application]` with `props` layered on top.
    pub fn from_config(config: &TomlConfig, props: PropertyBag) -> Result<Self> {
        let initial = config.application_props()?.merged(&props);
        let factory = factory_for(&config.driver);
        Self::create(initial, factory.as_ref())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ContextState {
        self.coordinator.state()
    }

    /// Snapshot of the context-level properties
    pub fn props(&self) -> PropertyBag {
        self.props
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    /// Play an event sound under request id `id`.
    ///
    /// Returns once the request is registered; await the [`Playback`] for
    /// its outcome.
    pub fn play(&self, id: RequestId, props: &PropertyBag) -> Result<Playback> {
        if !self.state().is_active() {
            return Err(Error::Destroyed);
        }
        self.check_enabled(props)?;
        self.coordinator.play(id, props)
    }

    /// Stop request `id` if it is still pending. Unknown ids are a no-op.
    pub fn cancel(&self, id: RequestId) -> Result<()> {
        self.coordinator.cancel(id).map(|_| ())
    }

    /// Whether request `id` is still pending
    pub fn playing(&self, id: RequestId) -> Result<bool> {
        self.coordinator.playing(id)
    }

    /// Pre-load a sample. `NotSupported` is a soft error callers should
    /// tolerate.
    pub fn cache(&self, props: &PropertyBag) -> Result<()> {
        if !self.state().is_active() {
            return Err(Error::Destroyed);
        }
        self.check_enabled(props)?;
        self.coordinator.cache(props)
    }

    /// Merge `props` into the context-level properties
    pub fn change_props(&self, props: &PropertyBag) -> Result<()> {
        self.coordinator.change_props(props)?;
        let mut current = self.props.lock().unwrap_or_else(PoisonError::into_inner);
        *current = current.merged(props);
        debug!("Context {} properties updated ({} keys)", self.id, current.len());
        Ok(())
    }

    /// Cancel all pending requests and release the driver.
    ///
    /// Only the first call does anything; later calls return `Destroyed`.
    pub fn destroy(&self) -> Result<()> {
        match self.coordinator.shutdown() {
            Ok(canceled) => {
                info!("Context {} destroyed ({} request(s) canceled)", self.id, canceled);
                Ok(())
            }
            Err(e) => {
                warn!("Context {} destroyed twice", self.id);
                Err(e)
            }
        }
    }

    fn check_enabled(&self, props: &PropertyBag) -> Result<()> {
        // Event properties override the context's own switch
        let enabled = match props.get(evsound_common::props::keys::CANBERRA_ENABLE) {
            Some(_) => props.sounds_enabled(),
            None => self
                .props
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .sounds_enabled(),
        };
        if enabled {
            Ok(())
        } else {
            Err(Error::Disabled)
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.state().is_active() {
            debug!("Context {} dropped while active, destroying", self.id);
            let _ = self.coordinator.shutdown();
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
