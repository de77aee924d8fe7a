use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use proto_scan::cli::{Cli, OutputFormat};
use proto_scan::{resolve, ScanReport, ScanRequest, Scanner};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only results.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let (low, high) = cli
        .port_range()
        .context("port range needs exactly two values: LOW HIGH")?;
    let ip = resolve::resolve_ipv4(&cli.target)
        .await
        .with_context(|| format!("cannot resolve target {}", cli.target))?;
    let request = ScanRequest::new(ip, cli.tcp, cli.udp, low, high)?;
    let scanner = Scanner::new(request, cli.settings());

    // Ctrl-C tears the worker pool down instead of leaving probes running.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let report = scanner.run_with_cancel(cancel).await?;
    match cli.format {
        OutputFormat::Text => print_lines(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn print_lines(report: &ScanReport) {
    for line in report.lines() {
        println!("{line}");
    }
}
