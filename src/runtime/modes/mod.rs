//! Mode routing
//!
//! - Server mode (HTTP lookup API, default)
//! - CLI mode (one-shot refresh / lookup / parse / config commands)

pub mod cli;
pub mod server;

pub use cli::run_cli_command;
pub use server::run_server;
