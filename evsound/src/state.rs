//! Context lifecycle state

use serde::Serialize;

/// Lifecycle of a context: `Active -> Destroying -> Destroyed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    /// Accepting requests
    Active,
    /// Draining pending requests; new submissions rejected
    Destroying,
    /// Terminal
    Destroyed,
}

impl ContextState {
    pub fn is_active(self) -> bool {
        self == ContextState::Active
    }
}

impl std::fmt::Display for ContextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextState::Active => write!(f, "active"),
            ContextState::Destroying => write!(f, "destroying"),
            ContextState::Destroyed => write!(f, "destroyed"),
        }
    }
}
