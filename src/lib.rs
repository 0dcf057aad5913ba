//! iplocator - IP to country resolution from RIR delegation data
//!
//! Downloads the five Regional Internet Registry extended delegation
//! feeds, stores the resulting CIDR ranges, and answers lookups through
//! a two-tier cache in front of the range store.
//!
//! # Architecture
//! - `rir`: delegation line parser and feed fetcher
//! - `storage`: range store backends (sea-orm SQL, in-memory)
//! - `cache`: resolution cache plugins (memory, redis) and the range index
//! - `services`: resolver and refresh coordinator
//! - `api`: HTTP services and middleware
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: logging and platform signal handling

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod rir;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
