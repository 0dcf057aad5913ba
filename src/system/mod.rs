//! System-level modules
//!
//! - Logging initialization
//! - Platform abstraction (signals)

pub mod logging;
pub mod platform;
