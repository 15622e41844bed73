use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use formpilot_analysis_core::{AnalysisCache, AnalysisProvider, HostedAnalysisClient};
use formpilot_core_types::UserData;
use formpilot_fill_executor::{DelayStrategy, HumanTempo, TempoPlan, ZeroDelay};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use formpilot_cli::{config, fixture, AppConfig, FillSession};

/// FormPilot - form intelligence & safe-fill pipeline
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full fill session against a recorded page fixture
    Fill(FillArgs),

    /// Extraction + classification dry run; prints the analysis as JSON
    Scan(ScanArgs),
}

#[derive(Args)]
struct FillArgs {
    /// Recorded page fixture (JSON)
    #[arg(long, value_name = "FILE")]
    fixture: PathBuf,

    /// User data file (TOML)
    #[arg(long, value_name = "FILE")]
    user: PathBuf,

    /// Skip the hosted model and use the heuristic scanner only
    #[arg(long)]
    offline: bool,

    /// Run without human pacing delays
    #[arg(long)]
    no_delays: bool,
}

#[derive(Args)]
struct ScanArgs {
    /// Recorded page fixture (JSON)
    #[arg(long, value_name = "FILE")]
    fixture: PathBuf,

    /// Skip the hosted model and use the heuristic scanner only
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let app_config = config::load_configuration(cli.config.as_deref())?;

    match cli.command {
        Commands::Fill(args) => run_fill(app_config, args).await,
        Commands::Scan(args) => run_scan(app_config, args).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Credential is required unless the run is explicitly offline - surfaced
/// here, before any page work or request.
fn build_provider(
    config: &AppConfig,
    offline: bool,
) -> Result<Option<Arc<dyn AnalysisProvider>>> {
    if offline {
        return Ok(None);
    }
    let client = HostedAnalysisClient::new(config.analysis.api_key.clone())
        .context("hosted analysis unavailable (pass --offline to use the heuristic scanner)")?
        .with_model(config.analysis.model.clone())
        .with_timeout(config.analysis_timeout());
    Ok(Some(Arc::new(client)))
}

fn build_tempo(config: &AppConfig, no_delays: bool) -> Arc<dyn DelayStrategy> {
    if no_delays {
        return Arc::new(ZeroDelay);
    }
    let plan = match config.timing.tempo.as_str() {
        "brisk" => TempoPlan::brisk(),
        _ => TempoPlan::default(),
    };
    match config.timing.tempo_seed {
        Some(seed) => Arc::new(HumanTempo::seeded(plan, seed)),
        None => Arc::new(HumanTempo::new(plan)),
    }
}

async fn run_fill(app_config: AppConfig, args: FillArgs) -> Result<()> {
    let user_raw = std::fs::read_to_string(&args.user)
        .with_context(|| format!("cannot read user data {}", args.user.display()))?;
    let user: UserData = toml::from_str(&user_raw)
        .with_context(|| format!("cannot parse user data {}", args.user.display()))?;
    if user.email.is_empty() {
        bail!("user data must include an email address");
    }

    let page_fixture = fixture::load(&args.fixture)?;
    info!(url = %page_fixture.url, "replaying recorded page");
    let driver = Arc::new(fixture::driver_for(&page_fixture));

    let provider = build_provider(&app_config, args.offline)?;
    let tempo = build_tempo(&app_config, args.no_delays);

    let mut session = FillSession::new(driver)
        .with_tempo(tempo)
        .with_config(app_config.clone());
    if let Some(provider) = provider {
        session = session.with_provider(provider);
    }
    if app_config.cache.enabled {
        session = session.with_cache(Arc::new(AnalysisCache::new(
            app_config.cache_ttl(),
            app_config.cache.capacity,
        )));
    }

    let outcome = session.run(&user, CancellationToken::new()).await?;
    if !outcome.summary.success {
        warn!("session finished without a successful fill");
    }
    println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
    Ok(())
}

async fn run_scan(app_config: AppConfig, args: ScanArgs) -> Result<()> {
    let page_fixture = fixture::load(&args.fixture)?;
    info!(url = %page_fixture.url, "replaying recorded page");
    let driver = Arc::new(fixture::driver_for(&page_fixture));

    let provider = build_provider(&app_config, args.offline)?;
    let mut session = FillSession::new(driver).with_config(app_config);
    if let Some(provider) = provider {
        session = session.with_provider(provider);
    }

    let analysis = session.scan().await?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}
