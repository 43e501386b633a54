//! # evsound Common Library
//!
//! Shared code for the evsound workspace:
//! - Stable event-sound error codes (`ErrorCode`)
//! - Property bags and the property key vocabulary
//! - Bootstrap configuration loading (TOML)
//! - Common error type

pub mod codes;
pub mod config;
pub mod error;
pub mod props;

pub use codes::ErrorCode;
pub use error::{Error, Result};
pub use props::{PropValue, PropertyBag, PropertyBagBuilder};
