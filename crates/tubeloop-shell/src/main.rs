//! Tubeloop - YouTube playlist player, interactive shell.
//!
//! Reads one command per line from stdin and drives a playback session over
//! a headless player. Player callbacks are typed in as commands.

mod commands;
mod headless;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use commands::{Command, Shell};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, error, info};
use tubeloop_core::{AppConfig, FileStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let verbose = std::env::args().skip(1).any(|arg| arg == "-v" || arg == "--verbose");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Using default configuration: {e}");
            AppConfig::default()
        }
    };

    let mut logging_config = logging::LoggingConfig::auto()
        .with_log_directory(logging::log_directory_in(&config.data_directory));
    if verbose {
        logging_config = logging_config.with_console_level(Level::DEBUG);
    }
    let _guard = match logging::init(&logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Starting Tubeloop");
    info!("Data directory: {}", config.data_directory.display());

    let storage = Arc::new(FileStore::in_directory(&config.data_directory));
    let mut shell = Shell::new(storage, &config);

    println!(
        "Tubeloop: {} entries loaded. Type `help` for commands.",
        shell.coordinator().playlist().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                return ExitCode::FAILURE;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match shell.execute(command).await {
            Ok(output) => {
                for line in output {
                    println!("{line}");
                }
            }
            Err(e) => {
                for line in shell.drain_events() {
                    println!("{line}");
                }
                println!("{e}");
            }
        }
    }

    info!("Tubeloop shutting down");
    ExitCode::SUCCESS
}
