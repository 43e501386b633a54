//! Backend driver interface
//!
//! The driver performs the actual playback. The coordinator only talks to
//! it through [`Driver`], and the driver reports terminal states back
//! through a [`Notifier`] handed over when it is opened.
//!
//! Drivers speak in [`ErrorCode`]s, the same vocabulary as the native
//! library they stand in for.

pub mod null;
pub mod simulated;

use evsound_common::config::{DriverConfig, DriverKind};
use evsound_common::{ErrorCode, PropertyBag};
use std::sync::Weak;
use tracing::debug;

pub use null::NullDriverFactory;
pub use simulated::{SimulatedConfig, SimulatedDriverFactory};

/// Caller-supplied request identifier
pub type RequestId = u32;

/// Result type for driver calls
pub type DriverResult<T> = std::result::Result<T, ErrorCode>;

/// Identifies one submission to the driver.
///
/// `serial` is assigned by the coordinator and increases with every
/// submission, so a late notification for a request whose id has since
/// been reused can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub id: RequestId,
    pub serial: u64,
}

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.id, self.serial)
    }
}

/// Receiver of driver notifications (implemented by the coordinator)
pub trait NotificationSink: Send + Sync {
    /// Called once per submission when it reaches a terminal state.
    ///
    /// Returns true if the notification resolved a pending request, false
    /// if it was discarded (already resolved, canceled, stale or unknown).
    fn on_backend_event(&self, ticket: Ticket, code: ErrorCode) -> bool;
}

/// Handle a driver uses to report terminal states.
///
/// Holds only a weak reference, so a driver thread that outlives its
/// context never keeps the coordinator alive.
#[derive(Clone)]
pub struct Notifier {
    sink: Weak<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(sink: Weak<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Report a terminal state for `ticket`
    pub fn notify(&self, ticket: Ticket, code: ErrorCode) -> bool {
        match self.sink.upgrade() {
            Some(sink) => sink.on_backend_event(ticket, code),
            None => {
                debug!("Dropping notification for {}: coordinator gone", ticket);
                false
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("attached", &(self.sink.strong_count() > 0))
            .finish()
    }
}

/// An opened backend driver
pub trait Driver: Send + Sync {
    /// Short driver name for logging
    fn name(&self) -> &'static str;

    /// Start playback for `ticket`.
    ///
    /// Errors returned here are synchronous (validation, capability). Once
    /// this returns `Ok`, exactly one notification for `ticket` follows,
    /// unless the request is canceled first or the driver is torn down.
    fn play(&self, ticket: Ticket, props: &PropertyBag) -> DriverResult<()>;

    /// Best-effort stop. Unknown or finished tickets are ignored.
    fn cancel(&self, ticket: Ticket);

    /// Pre-load a sample without playing it
    fn cache(&self, props: &PropertyBag) -> DriverResult<()>;

    /// Update context-level properties
    fn change_props(&self, props: &PropertyBag) -> DriverResult<()>;

    /// Release the driver. No notifications are delivered afterwards.
    fn teardown(self: Box<Self>);
}

/// Opens drivers for new contexts
pub trait DriverFactory: Send + Sync {
    fn open(&self, props: &PropertyBag, notifier: Notifier) -> DriverResult<Box<dyn Driver>>;
}

/// Driver factory selected by the `[driver]` config table
pub fn factory_for(config: &DriverConfig) -> Box<dyn DriverFactory> {
    match config.kind {
        DriverKind::Null => Box::new(NullDriverFactory),
        DriverKind::Simulated => Box::new(SimulatedDriverFactory::new(SimulatedConfig::from(config))),
    }
}

/// Whether `props` name something playable
pub(crate) fn has_sound_source(props: &PropertyBag) -> bool {
    props.contains(evsound_common::props::keys::EVENT_ID)
        || props.contains(evsound_common::props::keys::MEDIA_FILENAME)
}
