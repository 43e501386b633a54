//! # evsound
//!
//! Asynchronous event-sound playback coordinator.
//!
//! **Purpose:** Issue play requests to an event-sound backend, track them
//! while in flight, deliver exactly one outcome per request, and tear
//! down outstanding work when a context is destroyed.
//!
//! **Architecture:** [`Context`] owns a [`backend::Driver`] and a
//! [`Coordinator`]; drivers report terminal states through a
//! [`backend::Notifier`]; callers await a [`Playback`] per request.

pub mod backend;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod outcome;
pub mod state;

pub use backend::RequestId;
pub use context::Context;
pub use coordinator::Coordinator;
pub use error::{Error, Result};
pub use evsound_common::{ErrorCode, PropertyBag};
pub use outcome::{Outcome, Playback};
pub use state::ContextState;

/// Version banner: package version, source id, profile and build time
pub fn build_info() -> String {
    format!(
        "{} ({}, {} build {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_stamped() {
        let info = build_info();
        assert!(info.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(!env!("GIT_HASH").is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(env!("BUILD_TIMESTAMP")).is_ok());
    }
}
