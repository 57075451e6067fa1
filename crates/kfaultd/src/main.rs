mod config;
mod dispatch;
mod eventlog;
mod logging;

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use kfault_client::{Client, ClientError};
use kfault_wire::abi::Level;

use crate::config::ConfigError;
use crate::logging::{LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "kfaultd", version, about = "Kernel fault event logging daemon")]
struct Cli {
    /// Configuration file.
    #[arg(long, value_name = "PATH", default_value = "/etc/kfaultd.conf")]
    config: PathBuf,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,
}

#[derive(Debug, thiserror::Error)]
enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("cannot open event log {path}: {source}")]
    EventLog { path: PathBuf, source: io::Error },

    #[error("installing signal handlers: {0}")]
    Signals(io::Error),

    #[error("dispatch loop failed: {0}")]
    Dispatch(io::Error),
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.log_level);

    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), DaemonError> {
    let config = config::load(&cli.config)?;
    dispatch::install_signal_handlers().map_err(DaemonError::Signals)?;

    let mut client = Client::start()?;
    if config.filter_level != Level::Warn {
        client.set_filter_level(config.filter_level)?;
    }
    client.subscribe_by_type(config.categories, config.filter_level)?;

    let mut log =
        eventlog::EventLog::open(&config.log_file, config.use_utc).map_err(|source| {
            DaemonError::EventLog {
                path: config.log_file.clone(),
                source,
            }
        })?;

    info!(log_file = %config.log_file.display(), "kfaultd running");
    dispatch::run(&mut client, &mut log, &cli.config, config).map_err(DaemonError::Dispatch)?;

    client.into_channel().close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let cli = Cli::try_parse_from(["kfaultd"]).expect("bare invocation should parse");
        assert_eq!(cli.config, PathBuf::from("/etc/kfaultd.conf"));
        assert!(matches!(cli.log_format, LogFormat::Text));
        assert!(matches!(cli.log_level, LogLevel::Info));
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "kfaultd",
            "--config",
            "/tmp/kf.conf",
            "--log-format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("overrides should parse");
        assert_eq!(cli.config, PathBuf::from("/tmp/kf.conf"));
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(matches!(cli.log_level, LogLevel::Debug));
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["kfaultd", "--log-format", "xml"]).is_err());
    }
}
