use clap::Parser;
use dashboard_core::analysis::service::MarketAnalysisService;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "dashboard_worker")]
struct Args {
    /// Print the aggregated market summary only; the model is not called.
    #[arg(long)]
    summary_only: bool,

    /// Pretty-print the JSON result.
    #[arg(long)]
    pretty: bool,

    /// Exit with a non-zero status when the analysis is degraded.
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = dashboard_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let service = MarketAnalysisService::from_settings(&settings)?;
    let now = chrono::Utc::now();

    if args.summary_only {
        match service.market_summary(now).await {
            Ok(summary) => {
                println!("{summary}");
                return Ok(());
            }
            Err(err) => {
                let err = anyhow::Error::new(err);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "market summary failed");
                return Err(err);
            }
        }
    }

    let analysis = service.analyze_at(now).await;
    let out = if args.pretty {
        serde_json::to_string_pretty(&analysis.result)?
    } else {
        serde_json::to_string(&analysis.result)?
    };
    println!("{out}");

    tracing::info!(source = ?analysis.source, "worker run finished");
    if args.strict && analysis.result.is_error() {
        anyhow::bail!(
            "market analysis degraded: {}",
            analysis.result.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

fn init_sentry(settings: &dashboard_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
