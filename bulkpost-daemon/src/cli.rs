//! CLI argument definitions for bulkpost-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Input source meaning standard input.
pub const STDIN: &str = "-";

/// Bulk record shipper.
///
/// Reads NDJSON records, groups them into batches and delivers each batch
/// with a single bulk request.
#[derive(Parser, Debug)]
#[command(name = "bulkpost-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to bulkpost.toml configuration file.
    #[arg(short, long, default_value = "bulkpost.toml")]
    pub config: PathBuf,

    /// Input file with one JSON record per line ("-" reads stdin).
    #[arg(short, long, default_value = STDIN)]
    pub input: String,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without reading input.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Whether records are read from standard input.
    pub fn reads_stdin(&self) -> bool {
        self.input == STDIN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::try_parse_from(["bulkpost-daemon"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("bulkpost.toml"));
        assert!(cli.reads_stdin());
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn all_flags() {
        let cli = DaemonCli::try_parse_from([
            "bulkpost-daemon",
            "--config",
            "/etc/bulkpost/bulkpost.toml",
            "--input",
            "/var/log/app.ndjson",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/bulkpost/bulkpost.toml"));
        assert_eq!(cli.input, "/var/log/app.ndjson");
        assert!(!cli.reads_stdin());
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(DaemonCli::try_parse_from(["bulkpost-daemon", "--bogus"]).is_err());
    }
}
