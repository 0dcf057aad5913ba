//! Service layer
//!
//! Business logic shared between the HTTP API and the CLI.

mod refresh;
mod resolver;

pub use refresh::{RefreshCoordinator, RefreshHandle, RefreshReport, RefreshState, RefreshStatus};
pub use resolver::{IpResponse, Resolver};
