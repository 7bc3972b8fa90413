/*!
 * Chronos CLI
 *
 * `run` drives the on-device sampling loop; `verify` and `report` are the
 * offline forensic tools; `init-config` writes a starting configuration for
 * on-site threshold calibration.
 */

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use chronos::{
    config::ChronosConfig,
    error::{ChronosError, Result, EXIT_SUCCESS},
    logging, report,
    sensors::SensorHub,
    tracker::Tracker,
    verify_log,
};

#[derive(Parser)]
#[command(name = "chronos")]
#[command(
    version,
    about = "Wearable forensic attack logger with a tamper-evident hash-chain log",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the on-device sampling loop until interrupted
    Run {
        /// Configuration file (TOML); CHRONOS_* env vars override it
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Use synthetic sensor drivers instead of hardware
        #[arg(long)]
        simulate: bool,

        /// Stop after this many seconds (default: run until power-off)
        #[arg(long, value_name = "SECS")]
        duration_secs: Option<u64>,
    },

    /// Verify a chain log from genesis to tail
    Verify {
        /// Path of the chain log
        #[arg(short, long, value_name = "FILE")]
        log: PathBuf,

        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify a chain log, then summarize its contents
    Report {
        /// Path of the chain log
        #[arg(short, long, value_name = "FILE")]
        log: PathBuf,
    },

    /// Write a default configuration file
    InitConfig {
        #[arg(default_value = "chronos.toml")]
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => process::exit(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            config,
            simulate,
            duration_secs,
        } => run_tracker(config, simulate, duration_secs),
        Command::Verify { log, json } => verify(log, json),
        Command::Report { log } => run_report(log),
        Command::InitConfig { path } => init_config(path),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ChronosConfig> {
    let mut config = match path {
        Some(path) => ChronosConfig::from_file(&path)?,
        None => ChronosConfig::default(),
    };
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn run_tracker(
    config_path: Option<PathBuf>,
    simulate: bool,
    duration_secs: Option<u64>,
) -> Result<()> {
    let config = load_config(config_path)?;
    logging::init_logging(&config)?;

    if !simulate {
        // Hardware drivers plug into the SensorHub traits through the
        // library API; this binary ships none of them.
        return Err(ChronosError::Config(
            "no hardware drivers are linked into this binary; pass --simulate, or embed \
             chronos as a library and supply your own SensorHub"
                .to_string(),
        ));
    }

    tracing::info!(
        log_path = %config.log_path.display(),
        sample_hz = config.sample_hz,
        attack_threshold_pa = config.attack_threshold_pa,
        "tracker starting"
    );

    let mut tracker = Tracker::new(config, SensorHub::synthetic())?;
    tracker.run(duration_secs.map(Duration::from_secs))
}

fn verify(log: PathBuf, json: bool) -> Result<()> {
    let report = verify_log(&log)?;

    if json {
        let payload = serde_json::json!({
            "status": "valid",
            "entries": report.entries,
            "tail_sequence": report.tail_sequence,
            "tail_hash": report.tail_hash,
            "attacks": report.attacks,
            "heartbeats": report.heartbeats,
        });
        println!("{}", payload);
    } else {
        match report.tail_sequence {
            Some(tail) => println!(
                "Chain VALID: {} entries, tail sequence {}, tail hash {}",
                report.entries, tail, report.tail_hash
            ),
            None => println!("Chain VALID: empty log (genesis state)"),
        }
    }
    Ok(())
}

fn run_report(log: PathBuf) -> Result<()> {
    let summary = report::summarize_log(&log)?;
    println!("{}", report::summary_table(&summary));
    Ok(())
}

fn init_config(path: PathBuf) -> Result<()> {
    if path.exists() {
        return Err(ChronosError::Config(format!(
            "{} already exists; refusing to overwrite",
            path.display()
        )));
    }
    let config = ChronosConfig::default();
    config.to_file(&path)?;
    println!("Wrote default configuration to {}", path.display());
    println!("Calibrate attack_threshold_pa on-site: resting delta should read ~0 Pa.");
    Ok(())
}
