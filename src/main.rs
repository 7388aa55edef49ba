//! CLI entry point for the bike-share trip graph.
//!
//! Provides subcommands for loading the station catalog, fetching the route
//! table, building trip edges, and querying popularity, pair estimates and
//! dock-availability features.

use anyhow::{Context, Result};
use bike_graph::aggregator::MissingRoutePolicy;
use bike_graph::catalog;
use bike_graph::config::Settings;
use bike_graph::graph::GraphStore;
use bike_graph::infra::distance_matrix::DistanceMatrixClient;
use bike_graph::infra::gbfs::{GbfsCapacityFeed, StationIdOverrides};
use bike_graph::output::{print_json, write_route_table};
use bike_graph::pipeline::{build_graph, register_stations};
use bike_graph::query::{
    DockClassifier, FeatureVector, ThresholdClassifier, assemble_feature_vector, popularity,
    trip_estimate,
};
use bike_graph::services::{build_route_table, trip_pairs};
use chrono::{NaiveTime, Weekday};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bike_graph")]
#[command(about = "Bike-share trip graph builder and query tool", long_about = None)]
struct Cli {
    /// Graph database file (overrides BIKE_GRAPH_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register every catalog station as a graph node
    LoadStations {
        /// Station catalog CSV
        #[arg(short, long, default_value = "data/boston_current_bluebike_stations.csv")]
        stations: PathBuf,
    },
    /// Fetch bicycling distance and time for every trip pair and write the route table
    RouteTable {
        #[arg(short, long, default_value = "data/boston_current_bluebike_stations.csv")]
        stations: PathBuf,

        /// Cleaned trip CSV
        #[arg(short, long, default_value = "data/trips.csv")]
        trips: PathBuf,

        /// Route table CSV to write
        #[arg(short, long, default_value = "data/start_ends.csv")]
        output: PathBuf,

        /// Pairs per distance matrix request (at most 10)
        #[arg(long, default_value_t = 10)]
        batch_size: usize,

        /// Pause between requests, in milliseconds
        #[arg(long, default_value_t = 500)]
        pause_ms: u64,
    },
    /// Aggregate trips into edges and upsert stations and edges into the graph
    BuildEdges {
        #[arg(short, long, default_value = "data/boston_current_bluebike_stations.csv")]
        stations: PathBuf,

        #[arg(short, long, default_value = "data/trips.csv")]
        trips: PathBuf,

        /// Route table CSV
        #[arg(short, long, default_value = "data/start_ends.csv")]
        routes: PathBuf,

        /// Skip trip pairs missing from the route table instead of failing
        #[arg(long, default_value_t = false)]
        skip_incomplete: bool,
    },
    /// Show a station's share of network trip volume
    Popularity {
        #[arg(value_name = "STATION")]
        name: String,
    },
    /// Show the stored statistics for a directed station pair
    Trip {
        origin: String,
        destination: String,
    },
    /// Assemble the classifier feature vector for a destination
    Features(FeatureArgs),
    /// Predict dock availability at a destination
    Predict(FeatureArgs),
}

#[derive(Args)]
struct FeatureArgs {
    /// Destination station
    #[arg(short, long)]
    destination: String,

    /// Starting station; when given, TIME is the departure time
    #[arg(short, long)]
    origin: Option<String>,

    /// Day of week (Mon, Tuesday, ...)
    #[arg(long)]
    day: Weekday,

    /// Time of day, HH:MM or HH:MM:SS
    #[arg(long, value_parser = parse_time)]
    time: NaiveTime,
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| format!("invalid time '{s}': {e}"))
}

/// Colored stderr + JSON rolling log file. The returned guard must outlive
/// the program or buffered file lines are lost.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bike_graph.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bike_graph.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file
    let _file_guard = init_tracing()?;

    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    match cli.command {
        Commands::LoadStations { stations } => {
            let stations = catalog::load_stations(&stations)
                .with_context(|| format!("reading {}", stations.display()))?;
            let store = GraphStore::open(&settings.db_path)?;
            register_stations(&store, &stations)?;
            store.close();
        }
        Commands::RouteTable {
            stations,
            trips,
            output,
            batch_size,
            pause_ms,
        } => {
            let api_key = settings
                .maps_api_key
                .as_deref()
                .context("MAPS_API must be set to fetch the route table")?;
            let stations = catalog::load_stations(&stations)
                .with_context(|| format!("reading {}", stations.display()))?;
            let trips = catalog::load_trips(&trips)
                .with_context(|| format!("reading {}", trips.display()))?;

            let pairs = trip_pairs(&trips, &stations);
            info!(pairs = pairs.len(), "Looking up route distances");

            let lookup = DistanceMatrixClient::with_api_key(api_key)?;
            let routes = build_route_table(
                &lookup,
                &pairs,
                batch_size,
                Duration::from_millis(pause_ms),
            )
            .await?;

            write_route_table(&output, &routes)?;
            info!(path = %output.display(), rows = routes.len(), "Route table written");
        }
        Commands::BuildEdges {
            stations,
            trips,
            routes,
            skip_incomplete,
        } => {
            let policy = if skip_incomplete {
                MissingRoutePolicy::Skip
            } else {
                MissingRoutePolicy::Reject
            };

            let store = GraphStore::open(&settings.db_path)?;
            let summary = build_graph(&store, &stations, &trips, &routes, policy)
                .context("graph build failed")?;
            store.close();

            for pair in &summary.skipped {
                warn!(%pair, "Pair left out: no route estimate");
            }
            info!(
                stations = summary.stations,
                trips = summary.trips,
                edges = summary.edges,
                removed = summary.removed,
                skipped = summary.skipped.len(),
                "Graph build complete"
            );
        }
        Commands::Popularity { name } => {
            let store = GraphStore::open(&settings.db_path)?;
            let share = popularity(&store, &name)?;
            store.close();

            info!(station = %name, popularity = share, "Popularity");
        }
        Commands::Trip {
            origin,
            destination,
        } => {
            let store = GraphStore::open(&settings.db_path)?;
            let estimate = trip_estimate(&store, &origin, &destination)?;
            store.close();

            print_json(&estimate)?;
        }
        Commands::Features(args) => {
            let features = features(&settings, args).await?;
            info!(vector = ?features.to_array(), "Feature vector");
            print_json(&features)?;
        }
        Commands::Predict(args) => {
            let features = features(&settings, args).await?;
            let result = ThresholdClassifier::default().classify(&features);
            info!(?result, "{}", result.message());
        }
    }

    Ok(())
}

async fn features(settings: &Settings, args: FeatureArgs) -> Result<FeatureVector> {
    let overrides = match &settings.station_id_overrides {
        Some(path) => StationIdOverrides::load(path)?,
        None => StationIdOverrides::default(),
    };
    let feed = GbfsCapacityFeed::from_base_url(&settings.gbfs_base_url, overrides)?;

    let store = GraphStore::open(&settings.db_path)?;
    let result = assemble_feature_vector(
        &store,
        &feed,
        args.origin.as_deref(),
        &args.destination,
        args.day,
        args.time,
    )
    .await;
    store.close();

    Ok(result?)
}
