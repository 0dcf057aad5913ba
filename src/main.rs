use anyhow::Context;
use clap::Parser;
use colored::Colorize;

use iplocator::cli::{Cli, Commands};
use iplocator::config::{DEFAULT_CONFIG_PATH, get_config, init_config};
use iplocator::errors::IpLocatorError;
use iplocator::runtime::modes;
use iplocator::system::logging::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_config(cli.config.as_deref()).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH)
        )
    })?;

    // guard 必须存活到进程结束，保证非阻塞日志写完
    let _log_guard = init_logging(&get_config().logging)?;

    match cli.command {
        None | Some(Commands::Serve) => modes::run_server().await.inspect_err(|e| {
            eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
        }),
        Some(cmd) => {
            if let Err(e) = modes::run_cli_command(cmd).await {
                match e.downcast_ref::<IpLocatorError>() {
                    Some(err) => eprintln!("{}", err.format_colored()),
                    None => eprintln!("{} {:#}", "Error:".red().bold(), e),
                }
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
