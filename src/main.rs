use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod aggregation;
mod api;
mod config;
mod dashboard;
mod error;
mod filter;
mod models;
mod poller;
mod report;
mod store;
mod workflow;

use api::{AlertsApi, HttpAlertsApi};
use config::Settings;
use dashboard::{Dashboard, SaveOutcome};
use filter::{AlertQuery, Criterion};
use models::AlertStatus;

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Security alert triage console", long_about = None)]
struct Cli {
    /// Alerts API base URL (defaults to TRIAGE_API_URL or http://localhost:8000)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Case-insensitive text matched against title and description
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long, default_value = "")]
    severity: String,
    #[arg(long, default_value = "")]
    status: String,
}

impl FilterArgs {
    fn query(&self) -> AlertQuery {
        let query = AlertQuery::from_input(&self.search, &self.severity, &self.status);
        if let Criterion::Unrecognized(value) = &query.severity {
            tracing::warn!(%value, "unknown severity filter; no alert will match");
        }
        if let Criterion::Unrecognized(value) = &query.status {
            tracing::warn!(%value, "unknown status filter; no alert will match");
        }
        if !query.is_empty() {
            tracing::debug!(?query, "filtering alerts locally");
        }
        query
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List alerts, optionally filtered
    Alerts {
        #[command(flatten)]
        filter: FilterArgs,
        /// Maximum number of alerts requested from the backend
        #[arg(long)]
        limit: Option<u32>,
        /// Also write the filtered alerts to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Show summary cards, breakdowns and recent activity
    Stats,
    /// Render the full dashboard once
    Dashboard {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Keep the dashboard on screen, refreshing on a fixed interval
    Watch {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Ask the backend to generate alerts from its event source
    Generate,
    /// Change the triage status of one alert
    SetStatus {
        id: String,
        /// open, investigating, resolved or false_positive
        status: AlertStatus,
    },
    /// Print raw security events as JSON lines
    Events {
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let interval_secs = match &cli.command {
        Commands::Watch { interval_secs, .. } => *interval_secs,
        _ => None,
    };
    let mut settings = Settings::from_env()?
        .with_overrides(cli.api_url, cli.timeout_secs, interval_secs)
        .context("invalid configuration")?;
    if let Commands::Alerts { limit: Some(limit), .. } = &cli.command {
        settings.alert_limit = *limit;
    }

    let api = HttpAlertsApi::new(&settings).context("failed to build API client")?;
    tracing::debug!(base_url = %settings.api_base_url, "using alerts API");
    let dashboard = Arc::new(Dashboard::new(api, settings.alert_limit));

    match cli.command {
        Commands::Alerts { filter, csv, .. } => {
            load(&dashboard).await?;
            let query = filter.query();
            let (listing, output) = dashboard.read(|store| {
                let listing = store.listing(&query);
                let visible = store.visible(&query);
                (
                    listing,
                    report::render_alert_list(listing, &visible, false, |_| None),
                )
            });
            print!("{output}");

            if let Some(path) = csv {
                let written =
                    dashboard.read(|store| report::export_csv(&path, &store.visible(&query)))?;
                println!(
                    "Exported {written} of {} alerts to {}.",
                    listing.total,
                    path.display()
                );
            }
        }
        Commands::Stats => {
            load(&dashboard).await?;
            match dashboard.read(|store| store.view()) {
                Some(view) => print!("{}", report::render_overview(&view)),
                None => anyhow::bail!(error::FETCH_FAILED),
            }
        }
        Commands::Dashboard { filter } => {
            let _ = dashboard.refresh().await;
            let query = filter.query();
            print!("{}", dashboard.read(|store| report::render_dashboard(store, &query)));
        }
        Commands::Watch { filter, .. } => {
            watch(dashboard, settings, filter.query()).await?;
        }
        Commands::Generate => {
            let receipt = dashboard.generate_alerts().await.context(error::GENERATE_FAILED)?;
            println!("{} ({} alerts)", receipt.message, receipt.alert_count);
            print!(
                "{}",
                dashboard.read(|store| report::render_dashboard(store, &AlertQuery::default()))
            );
        }
        Commands::SetStatus { id, status } => {
            load(&dashboard).await?;
            let mut editor = dashboard.editor_for(&id)?;
            editor.begin_edit()?;
            editor.select(status)?;
            let previous = editor.current();
            tracing::debug!(alert_id = %id, state = ?editor.state(), "submitting status change");
            match dashboard.submit_status(&mut editor).await {
                Ok(SaveOutcome::Unchanged) => {
                    println!(
                        "Alert {} is already {}; nothing to update.",
                        editor.alert_id(),
                        editor.current().label()
                    );
                }
                Ok(SaveOutcome::Saved(receipt)) => {
                    println!(
                        "{} ({}: {} -> {})",
                        receipt.message,
                        receipt.alert_id,
                        previous.label(),
                        editor.current().label()
                    );
                }
                Err(err) => {
                    let message = error::DashboardError::update_message(editor.alert_id());
                    return Err(err).context(message);
                }
            }
        }
        Commands::Events { hours } => {
            let events = dashboard.recent_events(hours).await.context(error::FETCH_FAILED)?;
            for event in &events {
                println!("{}", serde_json::to_string(event.as_value())?);
            }
            tracing::debug!(count = events.len(), hours, "printed recent events");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Runs one refresh. A partial failure is reported but not fatal as long as
/// something was loaded.
async fn load<A: AlertsApi>(dashboard: &Dashboard<A>) -> anyhow::Result<()> {
    if let Err(err) = dashboard.refresh().await {
        let nothing_loaded =
            dashboard.read(|store| store.alerts().is_empty() && store.stats().is_none());
        if nothing_loaded {
            return Err(err).context(error::FETCH_FAILED);
        }
        eprintln!("Error: {}", error::FETCH_FAILED);
    }
    Ok(())
}

async fn watch<A: AlertsApi + 'static>(
    dashboard: Arc<Dashboard<A>>,
    settings: Settings,
    query: AlertQuery,
) -> anyhow::Result<()> {
    let mut revisions = dashboard.subscribe();
    let handle = poller::activate(Arc::clone(&dashboard), settings.poll_interval);
    tracing::info!(
        interval_secs = settings.poll_interval.as_secs(),
        "watching dashboard; press Ctrl-C to stop"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let screen = dashboard.read(|store| report::render_dashboard(store, &query));
                print!("\x1B[2J\x1B[H{screen}");
            }
        }
    }

    handle.deactivate();
    Ok(())
}
