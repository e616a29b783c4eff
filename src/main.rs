//! Cabin Guard - Cabin Oxygen Telemetry Monitor Binary
//!
//! Polls the cabin sensor, raises alerts and serves the live view over HTTP.

use anyhow::Context;
use cabin_guard::{
    start_web_server, AlertDispatcher, AppState, FileReadingCache, HistoricalAggregator,
    LogAlertSink, MemoryReadingCache, MonitorConfig, ReadingCache, SimulatedSensor,
    TelemetryPoller, TelemetryView, TimeRange, WebConfig,
};
use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::{Compact, DefaultFields, Format};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "cabin_guard")]
#[command(about = "Cabin Guard - Cabin Oxygen Telemetry Monitor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Polls a cabin oxygen sensor, classifies readings, raises alerts and reports history")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the monitored device id
    #[arg(long)]
    device_id: Option<String>,

    /// Override the poll interval in milliseconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Override the JSON-lines reading cache file
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the sensor and start the web server (default)
    Serve(ServeArgs),

    /// Poll the sensor and print every published view
    Watch(WatchArgs),

    /// Run a single poll cycle and exit
    Check(OutputArgs),

    /// Query readings and statistics for a time range
    History(HistoryArgs),
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Web server bind address (overrides `web.host`)
    #[arg(long)]
    host: Option<String>,

    /// Web server port (overrides `web.port`)
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Maximum WebSocket connections (overrides `web.max_websocket_connections`)
    #[arg(long)]
    max_connections: Option<usize>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the configured web settings.
    fn web_config(&self, configured: &WebConfig) -> WebConfig {
        let mut web = configured.clone();
        if let Some(host) = &self.host {
            web = web.with_host(host.clone());
        }
        if let Some(port) = self.port {
            web = web.with_port(port);
        }
        if self.no_cors {
            web = web.with_cors(false);
        }
        if let Some(max) = self.max_connections {
            web = web.with_max_websocket_connections(max);
        }
        web
    }
}

#[derive(Args)]
struct WatchArgs {
    /// Stop after this many views (unbounded if unset)
    #[arg(short = 'n', long)]
    count: Option<usize>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[derive(Args)]
struct HistoryArgs {
    /// Time range: 1h, 24h or 7d
    #[arg(short, long, default_value = "1h")]
    range: TimeRange,

    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

/// Everything a command needs, wired from one configuration.
struct Monitor {
    config: MonitorConfig,
    poller: Arc<TelemetryPoller>,
    aggregator: Arc<HistoricalAggregator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    init_logging(&cli)?;

    let config = load_config(&cli)?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(config, args).await?,
        Some(Commands::Watch(args)) => watch_command(config, args).await?,
        Some(Commands::Check(args)) => check_command(config, args).await?,
        Some(Commands::History(args)) => history_command(config, args).await?,
        None => serve_command(config, &ServeArgs::default()).await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing::subscriber::set_global_default(log_subscriber(cli, directives.as_deref()))?;

    Ok(())
}

/// `--debug`/`--verbose` set the default level; `RUST_LOG` directives refine it.
fn log_subscriber(cli: &Cli, directives: Option<&str>) -> FmtSubscriber<DefaultFields, Format<Compact>, EnvFilter> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .parse_lossy(directives.unwrap_or_default());

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish()
}

fn load_config(cli: &Cli) -> anyhow::Result<MonitorConfig> {
    let mut config =
        MonitorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(device_id) = &cli.device_id {
        config = config.with_device_id(device_id.clone());
    }
    if let Some(interval) = cli.interval {
        config = config.with_poll_interval_ms(interval);
    }
    if let Some(cache) = &cli.cache {
        config = config.with_cache_path(Some(cache.clone()));
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_monitor(config: MonitorConfig) -> Monitor {
    let sensor = Arc::new(SimulatedSensor::new().with_history(config.simulate_history));

    let cache: Arc<dyn ReadingCache> = match &config.cache_path {
        Some(path) => {
            info!("Persisting readings to {}", path.display());
            Arc::new(FileReadingCache::new(path))
        }
        None => Arc::new(MemoryReadingCache::new()),
    };

    let dispatcher = AlertDispatcher::new(Arc::new(LogAlertSink))
        .with_notifications(config.notifications_enabled)
        .with_emergency_number(Some(config.emergency_number.clone()))
        .with_delivery_timeout(config.alert_delivery_timeout());

    let poller = TelemetryPoller::new(&config, sensor.clone(), dispatcher).with_cache(cache.clone());
    let aggregator =
        HistoricalAggregator::new(sensor, cache).with_fetch_timeout(config.fetch_timeout());

    Monitor {
        config,
        poller: Arc::new(poller),
        aggregator: Arc::new(aggregator),
    }
}

async fn serve_command(config: MonitorConfig, args: &ServeArgs) -> anyhow::Result<()> {
    info!("Starting cabin guard monitor...");

    let monitor = build_monitor(config);
    monitor.poller.start()?;

    let web_config = args.web_config(&monitor.config.web);
    web_config.validate()?;

    info!("Monitor configuration:");
    info!("  - Device: {}", monitor.config.device_id);
    info!("  - Poll interval: {}ms", monitor.config.poll_interval_ms);
    info!("  - Fetch timeout: {}ms", monitor.config.fetch_timeout_ms);
    info!("  - Bind address: {}", web_config.socket_addr()?);
    info!("  - CORS enabled: {}", web_config.enable_cors);
    info!(
        "  - Max WebSocket connections: {}",
        web_config.max_websocket_connections
    );

    let state = AppState::new(monitor.poller.clone(), monitor.aggregator.clone());
    let result = start_web_server(web_config, state, shutdown_signal()).await;

    monitor.poller.stop();
    result?;
    Ok(())
}

async fn watch_command(config: MonitorConfig, args: &WatchArgs) -> anyhow::Result<()> {
    let monitor = build_monitor(config);
    let mut views = monitor.poller.view_stream();
    monitor.poller.start()?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut seen = 0usize;
    loop {
        tokio::select! {
            view = views.next() => {
                let Some(view) = view else { break };
                print_view_line(&view);
                seen += 1;
                if args.count.is_some_and(|count| seen >= count) {
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }

    monitor.poller.stop();
    Ok(())
}

async fn check_command(config: MonitorConfig, args: &OutputArgs) -> anyhow::Result<()> {
    let monitor = build_monitor(config);
    let view = monitor.poller.refresh_now().await?;
    monitor.poller.stop();

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&view)?),
        "pretty" => print_pretty_view(&monitor.config.device_id, &view),
        other => anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", other),
    }

    Ok(())
}

async fn history_command(config: MonitorConfig, args: &HistoryArgs) -> anyhow::Result<()> {
    let monitor = build_monitor(config);
    let report = monitor
        .aggregator
        .query(args.range)
        .await
        .with_context(|| format!("History query for {} failed", args.range))?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "pretty" => {
            println!("Oxygen history ({})", report.range);
            println!("==========================================");
            println!("  Source:   {:?}", report.source);
            println!("  Readings: {}", report.readings.len());
            println!("  Average:  {:.1}%", report.statistics.average);
            println!("  Minimum:  {:.1}%", report.statistics.minimum);
            println!("  Maximum:  {:.1}%", report.statistics.maximum);
        }
        other => anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", other),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn print_view_line(view: &TelemetryView) {
    match (view.reading, view.status) {
        (Some(reading), Some(status)) => println!(
            "{} {:>5.1}% {:<7} {}",
            reading.timestamp.format("%H:%M:%S"),
            reading.value,
            status.to_string(),
            if view.connected { "connected" } else { "disconnected" }
        ),
        _ => println!("-- no reading yet ({})", if view.connected { "connected" } else { "disconnected" }),
    }
}

fn print_pretty_view(device_id: &str, view: &TelemetryView) {
    println!("Cabin oxygen check: {}", device_id);
    println!("==========================================");
    match (view.reading, view.status) {
        (Some(reading), Some(status)) => {
            println!("  Oxygen:  {:.1}%", reading.value);
            println!("  Status:  {}", status);
            println!(
                "  Taken:   {}",
                reading.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        _ => println!("  No reading available"),
    }
    println!("  Connected: {}", view.connected);
}
