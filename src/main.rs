use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use churnlytics::config::DashboardConfig;
use churnlytics::controller::{LoadState, ViewController};
use churnlytics::filter::RiskSelector;
use churnlytics::payloads::{
    AtRiskPayload, ChurnPayload, EngagementPayload, FunnelPayload, LocationComparisonPayload,
    OverviewPayload, Projectable, RevenuePayload, ViewPayload,
};
use churnlytics::provider::{DataProvider, HttpDataProvider};
use churnlytics::record_set::RecordSet;
use churnlytics::refresh;
use churnlytics::report;
use churnlytics::sort::SortDirection;

#[derive(Parser)]
#[command(name = "churnlytics")]
#[command(about = "Retention analytics for multi-location fitness studios", long_about = None)]
struct Cli {
    /// Analytics API base URL (overrides CHURNLYTICS_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Rows shown in record tables (overrides CHURNLYTICS_PAGE_SIZE)
    #[arg(long, global = true)]
    page_size: Option<usize>,
    /// Write the report to a file instead of stdout
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct Selection {
    /// Case-insensitive match against the row's identifying fields
    #[arg(long, default_value = "")]
    search: String,
    /// Field to sort by (defaults to the view's own)
    #[arg(long)]
    sort: Option<String>,
    /// Sort ascending instead of descending
    #[arg(long)]
    asc: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Business KPIs, signup trend, and per-location activity
    Overview,
    /// Churn by membership, location, tenure, and personal training
    Churn,
    /// Members drifting away, with revenue exposure
    AtRisk {
        /// all, high, medium, or low
        #[arg(long, default_value = "all")]
        risk: RiskSelector,
        #[command(flatten)]
        selection: Selection,
        /// Rows to show (defaults to the page size)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Check-in patterns and engagement distribution
    Engagement,
    /// Revenue mix, trend, and lifetime value
    Revenue,
    /// Lead-to-member pipeline and lead sources
    Funnel {
        #[command(flatten)]
        selection: Selection,
    },
    /// Side-by-side location metrics
    Locations {
        #[command(flatten)]
        selection: Selection,
    },
    /// Check that the analytics API is reachable
    Health,
    /// Re-fetch the at-risk view on an interval
    Watch {
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn emit(report: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, report)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}.", path.display());
        }
        None => print!("{report}"),
    }
    Ok(())
}

async fn fetch_records<P: ViewPayload>(
    provider: &dyn DataProvider,
) -> anyhow::Result<RecordSet<P>> {
    let value = provider
        .fetch(P::VIEW.endpoint())
        .await
        .with_context(|| format!("failed to fetch the {} view", P::VIEW))?;
    Ok(RecordSet::from_value(value)?)
}

async fn load_view<P: Projectable>(
    provider: Arc<dyn DataProvider>,
    page_size: usize,
    risk: RiskSelector,
    selection: Selection,
) -> anyhow::Result<ViewController<P>> {
    let controller = ViewController::<P>::new(provider, page_size);
    controller.set_risk(risk);
    controller.set_search(selection.search);
    if let Some(field) = selection.sort {
        controller.set_sort_field(field);
    }
    if selection.asc {
        controller.set_direction(SortDirection::Ascending);
    }

    controller.load().await;
    if let LoadState::Error(message) = controller.load_state() {
        anyhow::bail!("the {} view failed to load: {message}", P::VIEW);
    }
    Ok(controller)
}

fn render_projected<P: Projectable>(
    controller: &ViewController<P>,
    render: impl FnOnce(&RecordSet<P>) -> String,
) -> anyhow::Result<String> {
    controller
        .with_records(|records| records.map(render))
        .with_context(|| format!("the {} view has no records loaded", P::VIEW))
}

async fn wait_for_refresh<P: Projectable>(
    controller: &ViewController<P>,
    refresh_key: u64,
) -> LoadState {
    loop {
        let state = controller.load_state();
        if controller.refresh_seen() >= refresh_key && state != LoadState::Loading {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = DashboardConfig::from_env()?;
    if let Some(api_url) = cli.api_url {
        config.api_base_url = api_url;
    }
    if let Some(page_size) = cli.page_size {
        config.page_size = page_size;
    }
    let http = Arc::new(
        HttpDataProvider::new(&config).context("failed to build the analytics API client")?,
    );
    let provider: Arc<dyn DataProvider> = http.clone();
    let out = cli.out.as_deref();

    match cli.command {
        Commands::Overview => {
            let records = fetch_records::<OverviewPayload>(provider.as_ref()).await?;
            emit(&report::render_overview(&records), out)?;
        }
        Commands::Churn => {
            let records = fetch_records::<ChurnPayload>(provider.as_ref()).await?;
            emit(&report::render_churn(&records), out)?;
        }
        Commands::AtRisk {
            risk,
            selection,
            limit,
        } => {
            let page_size = limit.unwrap_or(config.page_size);
            let controller =
                load_view::<AtRiskPayload>(provider, page_size, risk, selection).await?;
            let state = controller.view_state();
            let projection = controller.projection();
            let report = render_projected(&controller, |records| {
                report::render_at_risk(records, &state, &projection, config.revenue_loss_top_n)
            })?;
            emit(&report, out)?;
        }
        Commands::Engagement => {
            let records = fetch_records::<EngagementPayload>(provider.as_ref()).await?;
            emit(&report::render_engagement(&records), out)?;
        }
        Commands::Revenue => {
            let records = fetch_records::<RevenuePayload>(provider.as_ref()).await?;
            emit(&report::render_revenue(&records), out)?;
        }
        Commands::Funnel { selection } => {
            let controller = load_view::<FunnelPayload>(
                provider,
                config.page_size,
                RiskSelector::All,
                selection,
            )
            .await?;
            let state = controller.view_state();
            let projection = controller.projection();
            let report = render_projected(&controller, |records| {
                report::render_funnel(records, &state, &projection)
            })?;
            emit(&report, out)?;
        }
        Commands::Locations { selection } => {
            let controller = load_view::<LocationComparisonPayload>(
                provider,
                config.page_size,
                RiskSelector::All,
                selection,
            )
            .await?;
            let state = controller.view_state();
            let projection = controller.projection();
            let report = render_projected(&controller, |records| {
                report::render_locations(records, &state, &projection)
            })?;
            emit(&report, out)?;
        }
        Commands::Health => {
            let health = http
                .health()
                .await
                .context("analytics API health check failed")?;
            match health.timestamp {
                Some(timestamp) => println!("API status: {} ({timestamp})", health.status),
                None => println!("API status: {}", health.status),
            }
        }
        Commands::Watch {
            interval_secs,
            rounds,
        } => {
            let coordinator = refresh::global();
            let controller = Arc::new(
                load_view::<AtRiskPayload>(
                    provider,
                    config.page_size,
                    RiskSelector::All,
                    Selection {
                        search: String::new(),
                        sort: None,
                        asc: false,
                    },
                )
                .await?,
            );
            let listener = controller.follow(coordinator);

            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            ticker.tick().await;
            for round in 1..=rounds {
                ticker.tick().await;
                let key = coordinator.request_refresh();
                if let LoadState::Error(message) = wait_for_refresh(&controller, key).await {
                    listener.abort();
                    anyhow::bail!("refresh {round} failed: {message}");
                }

                let state = controller.view_state();
                let projection = controller.projection();
                let report = render_projected(controller.as_ref(), |records| {
                    report::render_at_risk(
                        records,
                        &state,
                        &projection,
                        config.revenue_loss_top_n,
                    )
                })?;
                info!(round, rounds, rows = projection.rows.len(), "at-risk view refreshed");
                emit(&report, out)?;
            }
            listener.abort();
        }
    }

    Ok(())
}
