//! mavparam CLI - Command-line tool for uploading parameters to MAVLink autopilots.
//!
//! ## Features
//!
//! - Upload `<name> <value>` parameter files with per-parameter confirmation
//! - Automatic serial port detection and bit-rate negotiation
//! - Offline parameter file checking
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

mod commands;
mod config;

use config::Config;

/// Default parameter file name.
const DEFAULT_PARAMS_FILE: &str = "params.txt";

/// mavparam - Upload parameter files to MAVLink autopilots.
///
/// Environment variables:
///   MAVPARAM_PORT               - Serial port (auto-detected if unset)
#[derive(Parser)]
#[command(name = "mavparam")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "MAVPARAM_PORT")]
    port: Option<String>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload a parameter file and reboot the autopilot.
    Upload {
        /// Parameter file (`<name> <value>` per line).
        #[arg(default_value = DEFAULT_PARAMS_FILE)]
        file: PathBuf,

        /// Do not reboot the autopilot after uploading.
        #[arg(long)]
        no_reboot: bool,

        /// Baud rate to probe (repeatable, replaces the default list).
        #[arg(short, long = "baud", value_name = "RATE")]
        baud: Vec<u32>,
    },

    /// Validate a parameter file without a device.
    Check {
        /// Parameter file (`<name> <value>` per line).
        #[arg(default_value = DEFAULT_PARAMS_FILE)]
        file: PathBuf,

        /// Output the parsed records as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "mavparam v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Upload {
            file,
            no_reboot,
            baud,
        } => {
            let code = commands::upload::cmd_upload(&cli, &config, file, *no_reboot, baud);
            if code != 0 {
                std::process::exit(code);
            }
        },
        Commands::Check { file, json } => {
            commands::check::cmd_check(file, *json)?;
        },
        Commands::ListPorts { json } => {
            commands::ports::cmd_list_ports(&config, *json)?;
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
        },
    }

    Ok(())
}
