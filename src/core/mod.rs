//! Core types shared by every OsmFlux module.
//!
//! Currently this is the error taxonomy and its user-facing rendering; see [`error`].

pub mod error;

pub use error::{ErrorContext, OsmfluxError, user_friendly_error};
