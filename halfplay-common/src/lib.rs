//! # halfplay Common Library
//!
//! Shared code for the halfplay monitor including:
//! - Error taxonomy (upstream, parse, startup, fatal)
//! - Event types (MonitorEvent enum) and the EventBus
//! - Configuration loading (TOML + environment + compiled defaults)

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, MonitorEvent, PlaybackMode};
