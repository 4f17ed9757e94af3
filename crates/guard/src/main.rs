//! mailguard CLI
//!
//! Runs the alert poller/escalation context against a detection service,
//! or performs one-shot scans, alert polls and health checks.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use detection::{ContentUnit, DetectionService, HttpDetectionClient};
use guard::alerts::{AlertPoller, BackgroundContext, EscalationCoordinator, SuppressionState};
use guard::clock::{Clock, SystemClock};
use guard::config::GuardConfig;
use guard::content::{BannerLifecycle, ContentDeduper, TerminalPage};
use notify::{activation_channel, Notifier, TerminalSurface};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Phishing and DNS alert guard for webmail
#[derive(Parser)]
#[command(name = "mailguard")]
#[command(about = "Phishing and DNS alert guard for webmail")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (json or text)
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Detection service URL (overrides MAILGUARD_SERVICE_URL)
    #[arg(long, global = true)]
    service_url: Option<String>,

    /// Minimum alert score to qualify (overrides MAILGUARD_ALERT_THRESHOLD)
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    #[default]
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll DNS alerts and prompt for escalation until interrupted
    Watch {
        /// Poll interval in milliseconds (overrides MAILGUARD_POLL_INTERVAL_MS)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Scan one message and render its banner
    Scan {
        /// Message subject
        #[arg(long, default_value = "")]
        subject: String,

        /// Message body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the message body from a file
        #[arg(long)]
        body_file: Option<PathBuf>,

        /// Also render the detail view
        #[arg(long)]
        detail: bool,
    },
    /// Poll alerts once and show which would qualify
    Alerts,
    /// Check detection service health
    Health,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("guard=debug,detection=debug,notify=debug,info")
        } else {
            EnvFilter::new("guard=info,warn")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let mut config = GuardConfig::default();
    if let Some(url) = cli.service_url.clone() {
        config.service_url = url;
    }
    if let Some(threshold) = cli.threshold {
        config.alert_threshold = threshold;
    }
    if let Commands::Watch {
        interval_ms: Some(ms),
    } = &cli.command
    {
        config.poll_interval_ms = *ms;
    }
    config.validate().context("Invalid configuration")?;

    let client = HttpDetectionClient::new(
        &config.service_url,
        config.api_key.as_deref(),
        config.request_timeout(),
    )
    .context("Failed to create detection client")?;

    match cli.command {
        Commands::Watch { .. } => watch(&config, client).await,
        Commands::Scan {
            subject,
            body,
            body_file,
            detail,
        } => {
            let body = match (body, body_file) {
                (Some(body), _) => body,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => String::new(),
            };
            scan(&config, &client, ContentUnit::new(subject, body), detail, cli.format).await
        }
        Commands::Alerts => alerts(&config, &client, cli.format).await,
        Commands::Health => health(&client, cli.format).await,
    }
}

async fn watch(config: &GuardConfig, client: HttpDetectionClient) -> Result<()> {
    let (tx, activations) = activation_channel();
    let notifier = Notifier::from_env(Arc::new(TerminalSurface::new(tx)));
    if notifier.is_disabled() {
        warn!("NOTIFY_DISABLED is set, alerts will be logged but never prompted");
    }
    let surface = notifier.surface_name();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let coordinator = EscalationCoordinator::new(Arc::new(client), notifier, clock)
        .with_dismiss_window(config.dismiss_window())
        .with_reason(config.escalation_reason.clone());
    let context = BackgroundContext::new(
        coordinator,
        AlertPoller::new(config.alert_threshold),
        config.poll_interval(),
    );
    let (handle, task) = context.spawn(activations);

    info!(
        service = %config.service_url,
        surface,
        "Watching for DNS alerts, Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Received SIGINT, shutting down");
    handle.shutdown();
    task.await.context("Background context panicked")?;
    Ok(())
}

async fn scan(
    config: &GuardConfig,
    client: &HttpDetectionClient,
    unit: ContentUnit,
    detail: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut deduper = ContentDeduper::new();
    let Some(ticket) = deduper.on_change(unit, true) else {
        bail!("Nothing to scan: subject and body are both empty");
    };

    let verdict = client
        .scan(&ticket.unit)
        .await
        .context("Scan request failed")?;

    if format == OutputFormat::Json {
        let output = json!({
            "fingerprint": ticket.fingerprint.as_str(),
            "verdict": verdict,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let timings = config.content_timings();
    let mut banner = BannerLifecycle::new(timings.reconcile_window, timings.reconcile_period);
    let mut page = TerminalPage::new(ticket.unit.clone());
    banner.present_verdict(&mut page, ticket.fingerprint, verdict);
    if detail {
        banner.open_detail(&mut page);
    }
    Ok(())
}

async fn alerts(
    config: &GuardConfig,
    client: &HttpDetectionClient,
    format: OutputFormat,
) -> Result<()> {
    let batch = client
        .list_alerts()
        .await
        .context("Failed to fetch alerts")?;
    let qualifying =
        SuppressionState::new().qualifying(&batch, SystemClock.now(), config.alert_threshold);

    if format == OutputFormat::Json {
        let output = json!({
            "alerts": batch,
            "qualifying": qualifying,
            "threshold": config.alert_threshold,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if batch.is_empty() {
        println!("{}", "No DNS alerts".green());
        return Ok(());
    }

    println!(
        "{} ({} fetched, {} at or above {:.2})",
        "DNS alerts".bold(),
        batch.len(),
        qualifying.len(),
        config.alert_threshold
    );
    for alert in &batch {
        let marker = if qualifying.iter().any(|q| q.key() == alert.key()) {
            "!".red().bold()
        } else {
            " ".normal()
        };
        let seen = alert
            .timestamp
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        println!("{marker} {:<40} {:.2}  {}", alert.domain, alert.score, seen.dimmed());
    }
    Ok(())
}

async fn health(client: &HttpDetectionClient, format: OutputFormat) -> Result<()> {
    let status = client
        .health()
        .await
        .with_context(|| format!("Health check failed for {}", client.base_url()))?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else if status.ok {
        println!("{} {}", "healthy".green().bold(), client.base_url());
        if let Some(count) = status.active_dns_alerts {
            println!("  active DNS alerts: {count}");
        }
        if let Some(loaded) = status.model_loaded {
            println!("  model loaded: {loaded}");
        }
    } else {
        bail!("Detection service at {} reports unhealthy", client.base_url());
    }
    Ok(())
}
