//! Common infrastructure for the softphone signaling bridge
//!
//! Shared by every crate in the workspace:
//!
//! - [`logging`] - `tracing` subscriber setup
//! - [`errors`] - infrastructure error type and context helpers
//! - [`config`] - layered file + environment configuration loading

pub mod config;
pub mod errors;
pub mod logging;

pub use config::load_layered;
pub use errors::{Error, ErrorContext, ErrorExt, Result};
pub use logging::{setup_logging, LogFormat, LoggingConfig};
