//! HTTP API
//!
//! - `services`: lookup / health / status handlers
//! - `middleware`: sampled request logging

pub mod middleware;
pub mod services;

pub use services::api_routes;
