//! Request outcomes
//!
//! A play request ends in exactly one [`Outcome`]. The caller observes it
//! by awaiting the [`Playback`] returned from `play`.

use crate::backend::RequestId;
use crate::error::Error;
use evsound_common::ErrorCode;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Terminal result of a play request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "code", rename_all = "lowercase")]
pub enum Outcome {
    /// Playback finished
    Success,
    /// Backend reported a failure
    Failure(ErrorCode),
    /// Stopped on purpose (cancel or context teardown)
    Canceled,
}

impl Outcome {
    /// Outcome for a code reported by the backend
    pub fn from_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Success => Outcome::Success,
            ErrorCode::Canceled => Outcome::Canceled,
            other => Outcome::Failure(other),
        }
    }

    pub fn code(self) -> ErrorCode {
        match self {
            Outcome::Success => ErrorCode::Success,
            Outcome::Failure(code) => code,
            Outcome::Canceled => ErrorCode::Canceled,
        }
    }

    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }

    pub fn is_canceled(self) -> bool {
        self == Outcome::Canceled
    }

    /// Promise-style view: success resolves, anything else rejects with the
    /// outcome's code
    pub fn into_result(self) -> Result<(), Error> {
        match self {
            Outcome::Success => Ok(()),
            other => Err(Error::from_code(other.code())),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure(code) => write!(f, "failure ({})", code),
            Outcome::Canceled => write!(f, "canceled"),
        }
    }
}

/// In-flight play request.
///
/// Resolves to the request's [`Outcome`]. Dropping it does not stop the
/// sound; use `cancel` for that.
#[derive(Debug)]
#[must_use = "await the playback to observe its outcome"]
pub struct Playback {
    id: RequestId,
    rx: oneshot::Receiver<Outcome>,
}

impl Playback {
    pub(crate) fn new(id: RequestId, rx: oneshot::Receiver<Outcome>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Outcome if already resolved, without waiting
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Outcome::Canceled),
        }
    }
}

impl Future for Playback {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the coordinator went away without
        // resolving; report that as a cancellation
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Outcome::Canceled))
    }
}
