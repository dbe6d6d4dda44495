//! cf-core: shared media types, errors, configuration, and the history log.
//!
//! This crate is the foundational dependency for the other cf-* crates,
//! providing the normalized media descriptor, conversion request parsing,
//! a unified error type, application configuration, and the bounded
//! lookup history.

pub mod config;
pub mod error;
pub mod history;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
