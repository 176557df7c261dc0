use anyhow::Result;
use clap::Parser;
use rollcam::config::CameraBackend;
use rollcam::console::ConsoleInput;
use rollcam::media::{CaptureDevice, SyntheticCamera};
use rollcam::presenter::TerminalSurface;
use rollcam::{AttendanceClient, RollcamConfig, TcpConnector};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "rollcam")]
#[command(about = "Camera client for face-recognition attendance")]
#[command(version)]
#[command(long_about = "A terminal client for a face-recognition attendance service. \
It captures frames from a local camera, sends them for recognition or student enrollment \
over a persistent channel, and shows attendance records.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "rollcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", help = "Write logs to a file as well as stderr")]
    log_file: Option<String>,

    /// Override the recognition service host
    #[arg(long, help = "Recognition service host")]
    host: Option<String>,

    /// Override the recognition service port
    #[arg(long, help = "Recognition service port")]
    port: Option<u16>,

    /// Use generated frames instead of a camera
    #[arg(long, help = "Use the synthetic camera regardless of configuration")]
    synthetic_camera: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let log_guard = init_logging(&args)?;

    info!("Starting rollcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match RollcamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(host) = &args.host {
        config.channel.host = host.clone();
    }
    if let Some(port) = args.port {
        config.channel.port = port;
    }
    if args.synthetic_camera {
        config.camera.backend = CameraBackend::Synthetic;
    }

    match config.validate() {
        Ok(()) if args.validate_config => {
            println!("✓ Configuration is valid");
            return Ok(());
        }
        Ok(()) => {}
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
    }

    let device = build_device(&config)?;
    let connector = TcpConnector::from(&config.channel);

    let mut client = AttendanceClient::new(config, device, TerminalSurface::stdout(true));
    client.start(connector);

    ConsoleInput::new(client.event_bus(), client.cancellation_token()).start()?;

    let exit_code = client.run().await.map_err(|e| {
        error!("Client error during execution: {}", e);
        e
    })?;

    info!("Rollcam exited with code: {}", exit_code);

    // Flush the file appender before exiting
    drop(log_guard);
    std::process::exit(exit_code);
}

fn build_device(config: &RollcamConfig) -> Result<Arc<dyn CaptureDevice>> {
    match config.camera.backend {
        CameraBackend::Synthetic => {
            info!("Using synthetic camera");
            Ok(Arc::new(SyntheticCamera::new(config.camera.ideal_resolution)))
        }
        #[cfg(all(feature = "camera", target_os = "linux"))]
        CameraBackend::V4l2 => {
            info!("Using v4l2 camera {}", config.camera.index);
            Ok(Arc::new(rollcam::media::V4l2Camera::new(&config.camera)))
        }
        #[cfg(not(all(feature = "camera", target_os = "linux")))]
        CameraBackend::V4l2 => {
            anyhow::bail!("v4l2 camera backend requires the `camera` feature on Linux")
        }
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rollcam={}", log_level)));

    // stdout belongs to the console surface
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .boxed()
        }
    };

    let (file_layer, guard) = match args.log_file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Log file path has no file name"))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Rollcam Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&RollcamConfig::default())?);
    Ok(())
}
