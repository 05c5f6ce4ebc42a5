//! gpsdsim CLI.
//!
//! Two subcommands:
//! - `run`: start the GPSD simulator and the web UI, optionally loading a
//!   persisted route, and shut everything down gracefully on SIGINT/SIGTERM.
//! - `import`: convert a GeoJSON `LineString` into a persisted route file.

mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use gpsdsim::gpsd::{writer, GpsdServer, WriterConfig};
use gpsdsim::http::HttpServer;
use gpsdsim::log::{Logger, TracingLogger};
use gpsdsim::logging::init_logging;
use gpsdsim::route::{Controller, ElevationClient, RoutePreparer};
use gpsdsim::{log_error, log_info, update};

use error::CliError;

/// Cadence of the emission loop.
const STEP_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "gpsdsim")]
#[command(version = gpsdsim::VERSION)]
#[command(about = "GPSD protocol simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the GPSD simulator and the web UI
    Run(RunArgs),

    /// Import a GeoJSON LineString into a persisted route file
    Import(ImportArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Port for the GPSD server
    #[arg(short = 'g', long, default_value_t = 2947)]
    gpsd_port: u16,

    /// Port for the web UI
    #[arg(short = 'w', long, default_value_t = 8881)]
    http_port: u16,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Path to a persisted route file to load at startup
    #[arg(short = 'f', long, default_value = "")]
    route_file: String,

    #[command(flatten)]
    writer: WriterArgs,
}

/// Overrides for the on-wire record fields.
#[derive(Args)]
struct WriterArgs {
    /// VERSION/release field
    #[arg(long, default_value = writer::DEFAULT_VERSION_RELEASE)]
    version_release: String,

    /// VERSION/rev field
    #[arg(long, default_value = writer::DEFAULT_VERSION_REV)]
    version_revision: String,

    /// VERSION/proto_major field
    #[arg(long, default_value_t = writer::DEFAULT_VERSION_PROTO_MAJOR)]
    version_proto_major: u32,

    /// VERSION/proto_minor field
    #[arg(long, default_value_t = writer::DEFAULT_VERSION_PROTO_MINOR)]
    version_proto_minor: u32,

    /// DEVICES/devices/path field
    #[arg(long, default_value = writer::DEFAULT_DEVICE_PATH)]
    device_path: String,

    /// DEVICES/devices/driver field
    #[arg(long, default_value = writer::DEFAULT_DEVICE_DRIVER)]
    device_driver: String,

    /// DEVICES/devices/activated field
    #[arg(long, default_value = writer::DEFAULT_DEVICE_ACTIVATED)]
    device_activated: String,

    /// DEVICES/devices/bps field
    #[arg(long, default_value_t = writer::DEFAULT_DEVICE_BPS)]
    device_bps: u32,

    /// DEVICES/devices/parity field
    #[arg(long, default_value = writer::DEFAULT_DEVICE_PARITY)]
    device_parity: String,

    /// DEVICES/devices/stopbits field
    #[arg(long, default_value_t = writer::DEFAULT_DEVICE_STOPBITS)]
    device_stopbits: u32,

    /// TPV/mode field
    #[arg(long, default_value_t = writer::DEFAULT_TPV_MODE)]
    tpv_mode: u32,
}

impl WriterArgs {
    fn to_config(&self) -> WriterConfig {
        WriterConfig {
            version_release: self.version_release.clone(),
            version_rev: self.version_revision.clone(),
            version_proto_major: self.version_proto_major,
            version_proto_minor: self.version_proto_minor,
            device_path: self.device_path.clone(),
            device_driver: self.device_driver.clone(),
            device_activated: self.device_activated.clone(),
            device_bps: self.device_bps,
            device_parity: self.device_parity.clone(),
            device_stopbits: self.device_stopbits,
            tpv_mode: self.tpv_mode,
        }
    }
}

#[derive(Args)]
struct ImportArgs {
    /// Route name (defaults to an import timestamp)
    #[arg(short, long, default_value = "")]
    name: String,

    /// Path to the input GeoJSON file
    #[arg(short, long)]
    input: String,

    /// Path to the output route file (defaults to a name derived from the route)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Speed cap in km/h for the route (0 means no speed limit)
    #[arg(short, long, default_value_t = 0)]
    speed: u32,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Import(args) => import(args).await,
    };

    if let Err(e) = result {
        e.exit();
    }
}

async fn run(args: RunArgs) -> Result<(), CliError> {
    init_logging(args.debug).map_err(|e| CliError::LoggingInit(e.to_string()))?;
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);

    let current_version = semver::Version::parse(gpsdsim::VERSION)
        .map_err(|e| CliError::Config(format!("invalid build version: {e}")))?;
    log_info!(logger, "GPSD Simulator v{current_version}");

    let shutdown = CancellationToken::new();

    tokio::spawn(update::check_for_update(
        shutdown.clone(),
        logger.clone(),
        current_version,
    ));

    let controller = Arc::new(Controller::new(shutdown.clone(), STEP_DELAY, logger.clone()));
    controller.startup();

    let gpsd_server = GpsdServer::bind(
        shutdown.clone(),
        args.gpsd_port,
        args.writer.to_config(),
        Arc::clone(&controller),
        logger.clone(),
    )
    .await
    .map_err(CliError::GpsdServer)?;
    gpsd_server.startup();

    let http_server = HttpServer::bind(
        shutdown.clone(),
        args.http_port,
        Arc::clone(&controller),
        logger.clone(),
    )
    .await
    .map_err(CliError::HttpServer)?;
    http_server.startup();

    match gpsdsim::route::load_route(&args.route_file) {
        Ok(Some(route)) => controller.set_route(route),
        Ok(None) => {}
        Err(e) => log_error!(logger, "error loading route from file {}: {e}", args.route_file),
    }

    wait_for_shutdown_signal().await;
    log_info!(logger, "starting graceful shutdown process");
    controller.shutdown();
    shutdown.cancel();

    Ok(())
}

async fn import(args: ImportArgs) -> Result<(), CliError> {
    init_logging(args.debug).map_err(|e| CliError::LoggingInit(e.to_string()))?;
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    log_info!(logger, "GPSD Simulator v{}", gpsdsim::VERSION);

    let preparer = RoutePreparer::new(STEP_DELAY, ElevationClient::default(), logger.clone());
    let written = gpsdsim::route::import_geojson(
        &preparer,
        &args.name,
        &args.input,
        args.output,
        args.speed,
    )
    .await
    .map_err(CliError::Import)?;

    log_info!(logger, "route written to {}", written.display());
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
