//! Core types for the oxidized-artic remote loader
//!
//! This crate provides the foundational types, error handling,
//! configuration, and logging infrastructure shared by the loader
//! subsystem crates.

pub mod error;
pub mod logging;
pub mod settings;
pub mod status;

pub use error::{EmulatorError, KernelError, LoaderError, NetError, Result};
pub use settings::{Settings, REGION_COUNT, REGION_VALUE_AUTO_SELECT};
pub use status::{ArticEvents, StatusSink, SystemStatus};
