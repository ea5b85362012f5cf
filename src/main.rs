//! Motion Logger CLI
//!
//! Records one motion session to a CSV log and prints its events.

use anyhow::{bail, Context};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use motion_logger::{
    config::{Config, SourceConfig},
    epoch_now_ms,
    ledger::SessionLedger,
    IioSource, SensorSource, SessionController, SessionEvent, SyntheticSource, VERSION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "motion-logger")]
#[command(version = VERSION)]
#[command(about = "Session-scoped motion sensor logger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one session until Ctrl+C or the duration elapses
    Record {
        /// Activity label stored with every record
        #[arg(long, default_value = "unlabeled")]
        label: String,

        /// Session id (random when omitted)
        #[arg(long)]
        session_id: Option<String>,

        /// Stop automatically after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Where samples come from
        #[arg(long, value_enum, default_value = "iio")]
        source: SourceKind,

        /// Sensors to capture (accel, gyro, or all)
        #[arg(long)]
        sensors: Option<String>,

        /// Sampling rate in Hz
        #[arg(long)]
        rate: Option<u32>,

        /// Event output format
        #[arg(long, value_enum, default_value = "text")]
        events: EventFormat,
    },

    /// Show configuration and cumulative statistics
    Status,

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    /// Linux IIO sysfs devices
    Iio,
    /// Generated waveform, no hardware needed
    Synthetic,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EventFormat {
    Text,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Record {
            label,
            session_id,
            duration,
            source,
            sensors,
            rate,
            events,
        } => cmd_record(&label, session_id, duration, source, sensors, rate, events),
        Commands::Status => cmd_status(),
        Commands::Config { init } => cmd_config(init),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {}", e);
        Config::default()
    })
}

fn cmd_record(
    label: &str,
    session_id: Option<String>,
    duration: Option<u64>,
    source: SourceKind,
    sensors: Option<String>,
    rate: Option<u32>,
    format: EventFormat,
) -> anyhow::Result<()> {
    let mut config = load_config();
    if let Some(sensors) = sensors {
        config.sources = SourceConfig::from_csv(&sensors);
    }
    if let Some(rate) = rate {
        config.sample_rate_hz = rate;
    }
    config.validate().context("Invalid settings")?;
    config
        .ensure_directories()
        .context("Could not create data directories")?;

    let sensor_source: Box<dyn SensorSource> = match source {
        SourceKind::Iio => Box::new(IioSource::new(&config.iio_path, config.sample_rate_hz)),
        SourceKind::Synthetic => Box::new(SyntheticSource::generator(config.sample_rate_hz)),
    };

    let ledger = Arc::new(SessionLedger::with_persistence(config.ledger_path()));
    let controller = SessionController::with_ledger(
        sensor_source,
        config.controller_config(),
        ledger.clone(),
    );
    let events = controller.subscribe_events();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")?;

    let session_id = session_id.unwrap_or_else(generate_session_id);
    let outcome = controller
        .start(label, &session_id, epoch_now_ms())
        .context("Could not start session")?;
    if !outcome.is_accepted() {
        bail!("A session is already running");
    }

    eprintln!("Motion Logger v{VERSION}");
    eprintln!("  Logs: {}", controller.logs_dir().display());
    eprintln!("  Rate: {} Hz", config.sample_rate_hz);
    eprintln!("Press Ctrl+C to stop");

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    while running.load(Ordering::SeqCst) && deadline.map_or(true, |d| Instant::now() < d) {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => print_event(&event, format),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    controller.stop();
    for event in events.try_iter() {
        print_event(&event, format);
    }

    if let Some(path) = controller.last_log_path() {
        eprintln!("Log written to {}", path.display());
    }

    if let Err(e) = ledger.save() {
        tracing::warn!("Could not save ledger: {}", e);
    }
    eprintln!();
    eprintln!("{}", ledger.summary());
    Ok(())
}

/// Short random id, 12 hex characters.
fn generate_session_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

fn print_event(event: &SessionEvent, format: EventFormat) {
    if format == EventFormat::Json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!("Could not serialize event: {}", e),
        }
        return;
    }

    match event {
        SessionEvent::Started {
            session_id,
            label,
            start_epoch_ms,
        } => {
            let at = Local
                .timestamp_millis_opt(*start_epoch_ms)
                .single()
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| start_epoch_ms.to_string());
            println!("[{at}] Session {session_id} ({label}) started");
        }
        SessionEvent::LiveSample { sensor, x, y, z, .. } => {
            println!("  {:<4} x={x:>9.4} y={y:>9.4} z={z:>9.4}", sensor.tag());
        }
        SessionEvent::Fault { fault, message, .. } => {
            println!("  ! {fault:?}: {message}");
        }
        SessionEvent::Stopped {
            session_id,
            label,
            duration_ms,
            acc_count,
            gyro_count,
            acc_mean,
            gyro_mean,
        } => {
            println!(
                "Session {session_id} ({label}) stopped after {:.1}s",
                *duration_ms as f64 / 1000.0
            );
            println!(
                "  ACC  n={acc_count:<8} mean=({:.4}, {:.4}, {:.4})",
                acc_mean.x, acc_mean.y, acc_mean.z
            );
            println!(
                "  GYRO n={gyro_count:<8} mean=({:.4}, {:.4}, {:.4})",
                gyro_mean.x, gyro_mean.y, gyro_mean.z
            );
        }
    }
}

fn cmd_status() -> anyhow::Result<()> {
    let config = load_config();

    println!("Motion Logger Status");
    println!("====================");
    println!();

    let iio = IioSource::new(&config.iio_path, config.sample_rate_hz);
    println!("Hardware ({}):", config.iio_path.display());
    for kind in config.sources.kinds() {
        println!(
            "  {}: {}",
            kind,
            if iio.is_available(kind) {
                "available"
            } else {
                "not found"
            }
        );
    }
    println!();

    println!("Configuration:");
    println!("  Logs directory: {}", config.logs_dir().display());
    println!("  Sample rate: {} Hz", config.sample_rate_hz);
    println!("  Live cadence: every {} samples", config.live_cadence);
    println!();

    let ledger_path = config.ledger_path();
    if ledger_path.exists() {
        let stats = SessionLedger::with_persistence(ledger_path).stats();
        println!("Cumulative Statistics:");
        println!("  Sessions started: {}", stats.sessions_started);
        println!("  Sessions completed: {}", stats.sessions_completed);
        println!("  Accelerometer samples: {}", stats.accel_samples);
        println!("  Gyroscope samples: {}", stats.gyro_samples);
        println!("  Record write failures: {}", stats.write_failures);
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_config(init: bool) -> anyhow::Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    if init {
        config.save().context("Could not save configuration")?;
        println!("  (written)");
    }
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("Could not serialize configuration")?
    );
    Ok(())
}
