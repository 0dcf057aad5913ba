//! CLI mode
//!
//! One-shot commands sharing the server's configuration and components.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::cli::{Commands, ConfigCommands};
use crate::config::{StaticConfig, get_config};
use crate::rir::parse_feed_file;
use crate::runtime::lifetime;

/// Run a CLI command from clap-parsed input
///
/// `Serve` is handled by the caller and never reaches this function.
pub async fn run_cli_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Refresh => refresh_once().await,
        Commands::Lookup { ip } => lookup(&ip).await,
        Commands::Parse { file_path, verbose } => parse_file(file_path, verbose).await,
        Commands::Config { action } => match action {
            ConfigCommands::Generate { output_path, force } => config_generate(output_path, force),
            ConfigCommands::Show => config_show(),
        },
        Commands::Serve => Ok(()),
    }
}

async fn build_context() -> Result<lifetime::startup::StartupContext> {
    lifetime::startup::build_context(&get_config()).await
}

async fn refresh_once() -> Result<()> {
    let ctx = build_context().await?;

    // Ctrl+C 取消正在进行的刷新
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    println!("{}", "Refreshing range data...".yellow());
    let report = ctx.refresh.refresh(&cancel).await?;

    for source in &report.sources {
        match (&source.stats, &source.error) {
            (Some(stats), _) => println!(
                "  {} {:<10} {} IPv4, {} IPv6, {} skipped, {} errors",
                "✓".green(),
                source.source,
                stats.ipv4,
                stats.ipv6,
                stats.skipped,
                stats.parse_errors
            ),
            (None, Some(err)) => println!("  {} {:<10} {}", "✗".red(), source.source, err.red()),
            (None, None) => {}
        }
    }
    println!(
        "{} {} ranges stored in {}ms",
        "Refresh completed:".green().bold(),
        report.total,
        report.duration_ms
    );
    Ok(())
}

async fn lookup(ip: &str) -> Result<()> {
    let ctx = build_context().await?;
    let resp = ctx.resolver.lookup(ip).await?;
    if resp.is_unknown() {
        println!("{} {}", resp.ip.blue(), "unknown".dimmed());
    } else {
        println!("{} {}", resp.ip.blue(), resp.country_code.green().bold());
    }
    Ok(())
}

async fn parse_file(file_path: String, verbose: bool) -> Result<()> {
    let max_line_bytes = get_config().fetcher.max_line_bytes;
    let path = file_path.clone();
    let batch = tokio::task::spawn_blocking(move || parse_feed_file(path, max_line_bytes))
        .await
        .context("parse task failed")??;

    if verbose {
        for range in &batch.ranges {
            println!("{}", range);
        }
    }

    let stats = batch.stats;
    println!("{} {}", "Parsed".green().bold(), file_path.blue());
    println!("  lines:        {}", stats.lines);
    println!("  ipv4 ranges:  {}", stats.ipv4);
    println!("  ipv6 ranges:  {}", stats.ipv6);
    println!("  skipped:      {}", stats.skipped);
    println!("  parse errors: {}", stats.parse_errors);
    Ok(())
}

fn config_generate(output_path: Option<String>, force: bool) -> Result<()> {
    let path = output_path.unwrap_or_else(|| "config.example.toml".to_string());

    // 文件已存在时，非 --force 模式下交互确认
    if !force && Path::new(&path).exists() {
        print!(
            "{} {} {}",
            "File already exists:".yellow(),
            path.blue(),
            "Overwrite? [y/N] ".yellow()
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{}", "Aborted.".red());
            return Ok(());
        }
    }

    StaticConfig::default()
        .save_to_file(&path)
        .map_err(|e| anyhow::anyhow!("Unable to write configuration file: {}", e))?;
    println!(
        "{} {}",
        "Configuration file generated:".green(),
        path.blue()
    );
    Ok(())
}

fn config_show() -> Result<()> {
    let config = get_config();
    let rendered =
        toml::to_string_pretty(config.as_ref()).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}
