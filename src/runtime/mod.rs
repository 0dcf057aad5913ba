//! Application lifecycle and execution modes
//!
//! - `lifetime`: component assembly at startup, shutdown signal handling
//! - `modes`: server and one-shot CLI entry points

pub mod lifetime;
pub mod modes;
