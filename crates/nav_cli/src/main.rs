use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use nav_core::config::NavConfig;
use nav_core::geo::Coordinate;
use nav_core::places::{resolve_endpoint, KNOWN_PLACES};
use nav_core::prediction::lagos_bottlenecks;
use nav_core::routing::RouteProviderKind;
use nav_core::search::{Aggregator, PredictionScope, SearchOptions, SearchResult};
use nav_core::session::{SearchOutcome, SearchSession};
use nav_core::traffic::{mean_speeds, FlowProviderKind, MAX_SAMPLE_COUNT};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "lagos-nav",
    about = "Routes, live congestion, and bottleneck advisories for Lagos trips"
)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "NAV_CONFIG")]
    config: Option<PathBuf>,
    /// Straight-line routes and the built-in speed profile; no API key needed
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search routes once and print them
    Search(SearchArgs),
    /// Search, then print every traffic refresh until Ctrl-C
    Watch {
        #[command(flatten)]
        search: SearchArgs,
        /// Refresh period in seconds (overrides configuration)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// List known place names accepted by --from and --to
    Places,
    /// List the bottlenecks that trigger a prediction
    Bottlenecks,
}

#[derive(Args)]
struct SearchArgs {
    /// Start: "lat,lon" or a known place name
    #[arg(long)]
    from: String,
    /// Destination: "lat,lon" or a known place name
    #[arg(long)]
    to: String,
    /// Maximum number of alternate routes
    #[arg(long)]
    alternatives: Option<u32>,
    /// Traffic sample positions per route
    #[arg(long)]
    samples: Option<usize>,
    /// Check every route against the bottleneck list, not only the main one
    #[arg(long)]
    all_routes: bool,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl SearchArgs {
    fn endpoints(&self) -> Result<(Coordinate, Coordinate)> {
        let start = resolve_endpoint(&self.from).with_context(|| format!("--from {:?}", self.from))?;
        let end = resolve_endpoint(&self.to).with_context(|| format!("--to {:?}", self.to))?;
        Ok((start, end))
    }

    fn options(&self, config: &NavConfig) -> Result<SearchOptions> {
        let mut options = SearchOptions::from_config(config);
        if let Some(alternatives) = self.alternatives {
            options.max_alternatives = alternatives;
        }
        if let Some(samples) = self.samples {
            if samples > MAX_SAMPLE_COUNT {
                bail!("--samples must be at most {MAX_SAMPLE_COUNT}");
            }
            options.sample_count = samples;
        }
        if self.all_routes {
            options.prediction_scope = PredictionScope::AllRoutes;
        }
        Ok(options)
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NAV_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("NAV_LOG_JSON")
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(path: Option<&Path>, offline: bool) -> Result<NavConfig> {
    let location = path.map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
    NavConfig::load_with(
        path,
        |config| {
            if offline {
                config.routing.provider = RouteProviderKind::Direct;
                config.traffic.provider = FlowProviderKind::Profile;
            }
        },
        |name| std::env::var(name).ok(),
    )
    .with_context(|| {
        format!("loading configuration from {location} (use --offline to run without an API key)")
    })
}

fn print_result(result: &SearchResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{} -> {}", result.start, result.end);
    for route in &result.routes {
        let level = result.congestion(route.id);
        let speeds = result
            .traffic_by_route
            .get(&route.id)
            .and_then(|segments| mean_speeds(segments))
            .map(|s| format!(", {:.0}/{:.0} km/h", s.current_speed_kmh, s.free_flow_speed_kmh))
            .unwrap_or_default();
        println!(
            "  {:<12} {:>4} min {:>6.1} km  {} ({}{})",
            route.id.to_string(),
            route.eta_minutes(),
            route.summary.distance_m / 1000.0,
            level,
            level.label(),
            speeds,
        );
    }
    if let Some(prediction) = &result.prediction {
        let status = prediction.status.as_deref().unwrap_or("unknown");
        print!("  prediction [{status}]");
        if let Some(message) = &prediction.message {
            print!(" {message}");
        }
        if let Some(seconds) = prediction.predicted_travel_time() {
            print!(" (predicted {:.0} min)", seconds / 60.0);
        }
        println!();
    }
    for warning in &result.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}

async fn run_search(config: &NavConfig, args: &SearchArgs) -> Result<()> {
    let (start, end) = args.endpoints()?;
    let aggregator = Aggregator::from_config(config)?;
    let result = aggregator.search(start, end, &args.options(config)?).await?;
    print_result(&result, args.json)
}

async fn run_watch(config: &NavConfig, args: &SearchArgs, interval: Option<u64>) -> Result<()> {
    let (start, end) = args.endpoints()?;
    let options = args.options(config)?;
    let period = match interval {
        Some(0) => bail!("--interval must be positive"),
        Some(secs) => Some(std::time::Duration::from_secs(secs)),
        None => config.refresh.interval(),
    };
    let Some(period) = period else {
        bail!("refresh is disabled; set --interval or refresh.interval_secs");
    };

    let aggregator = Arc::new(Aggregator::from_config(config)?);
    let session = SearchSession::new(aggregator, Some(period));
    let mut updates = session.subscribe();

    match session.search(start, end, &options).await? {
        SearchOutcome::Committed(result) => print_result(&result, args.json)?,
        SearchOutcome::Superseded { .. } => return Ok(()),
    }
    updates.borrow_and_update();
    info!(every_secs = period.as_secs(), "watching traffic; Ctrl-C to stop");

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if let Some(result) = state.result {
                    println!("-- refresh #{} --", state.refreshes);
                    print_result(&result, args.json)?;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    session.stop_refresh();
    Ok(())
}

// ── main ───────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Places => {
            for place in KNOWN_PLACES {
                println!("{:<16} {}", place.name, place.position);
            }
            Ok(())
        }
        Commands::Bottlenecks => {
            for bottleneck in lagos_bottlenecks() {
                println!("{:<22} {}", bottleneck.label, bottleneck.position);
            }
            Ok(())
        }
        Commands::Search(args) => {
            let config = load_config(cli.config.as_deref(), cli.offline)?;
            run_search(&config, args).await
        }
        Commands::Watch { search, interval } => {
            let config = load_config(cli.config.as_deref(), cli.offline)?;
            run_watch(&config, search, *interval).await
        }
    }
}
