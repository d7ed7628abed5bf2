//! statuspal-notify — send an Alertmanager webhook message to Statuspal.
//!
//! Reads a Statuspal notifier config (YAML) and a captured webhook message
//! (JSON, file or stdin), performs one delivery attempt and maps the outcome
//! to the exit code: 0 delivered, 75 retryable failure, 1 permanent failure.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use statuspal_core::{Alert, WebhookMessage};
use statuspal_notify::{
    test_alerts, DispatchOutcome, Dispatcher, Notifier, NotifyContext, StatuspalConfig,
};

/// `EX_TEMPFAIL` from sysexits.h.
const EXIT_RETRYABLE: u8 = 75;

// ── CLI ─────────────────────────────────────────────────────────────

/// Deliver alert notifications to a Statuspal status page.
#[derive(Parser, Debug)]
#[command(name = "statuspal-notify", version, about)]
struct Cli {
    /// Path to the Statuspal notifier config (YAML).
    #[arg(long, env = "STATUSPAL_CONFIG", default_value = "config/statuspal.yaml")]
    config: PathBuf,

    /// Alertmanager webhook message (JSON); `-` reads stdin.
    #[arg(long, default_value = "-", conflicts_with = "test")]
    alerts: String,

    /// Give up on the request after this many seconds.
    #[arg(long, env = "STATUSPAL_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Print the rendered payload instead of sending it.
    #[arg(long)]
    dry_run: bool,

    /// Send a synthetic test alert instead of reading a message.
    #[arg(long)]
    test: bool,
}

fn read_message(source: &str) -> anyhow::Result<WebhookMessage> {
    if source == "-" {
        let mut data = String::new();
        std::io::stdin()
            .read_to_string(&mut data)
            .context("failed to read webhook message from stdin")?;
        Ok(WebhookMessage::from_json(&data)?)
    } else {
        WebhookMessage::from_file(source).with_context(|| format!("failed to load {source}"))
    }
}

/// The batch to deliver: the synthetic test alert or a webhook message.
fn load_batch(cli: &Cli) -> anyhow::Result<(NotifyContext, Vec<Alert>)> {
    if cli.test {
        return Ok((NotifyContext::for_test(), test_alerts()));
    }
    let message = read_message(&cli.alerts)?;
    Ok((NotifyContext::from_webhook(&message), message.alerts()))
}

fn exit_code(outcome: &DispatchOutcome) -> ExitCode {
    match &outcome.error {
        None => ExitCode::SUCCESS,
        Some(_) if outcome.retryable => ExitCode::from(EXIT_RETRYABLE),
        Some(_) => ExitCode::FAILURE,
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = StatuspalConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    info!(
        path = %cli.config.display(),
        domain = %config.statuspage_domain,
        "loaded statuspal config"
    );
    let dispatcher = Dispatcher::new(config)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, cancelling notification");
                cancel.cancel();
            }
        });
    }

    let (ctx, alerts) = load_batch(&cli)?;
    let ctx = ctx
        .with_cancellation(cancel)
        .with_timeout(Duration::from_secs(cli.timeout));

    if cli.dry_run {
        let payload = dispatcher.render_payload(&ctx, &alerts)?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(ExitCode::SUCCESS);
    }

    info!(group_key = %ctx.group_key, alerts = alerts.len(), "sending notification");
    let outcome = dispatcher.notify(&ctx, &alerts).await;

    match &outcome.error {
        None => info!("notification delivered"),
        Some(e) => tracing::error!(retryable = outcome.retryable, error = %e, "notification failed"),
    }

    Ok(exit_code(&outcome))
}
