use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use loyalty_common::config::{LoyaltyPolicy, VERSION};
use serde::{Deserialize, Serialize};

use crate::core::config::RocksDBConfig;

// Default directory of the RocksDB database
pub const DEFAULT_DIR_PATH: &str = "loyalty_data/";

// Logs are written under this directory, it must end with a /
pub const DEFAULT_LOGS_PATH: &str = "logs/";
pub const DEFAULT_LOG_FILENAME: &str = "loyalty-daemon.log";
pub const DEFAULT_LOGS_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// Attempts to draw an unused referral code before giving up
pub const MAX_REFERRAL_CODE_ATTEMPTS: usize = 16;

fn default_dir_path() -> String {
    DEFAULT_DIR_PATH.to_owned()
}

fn default_logs_path() -> String {
    DEFAULT_LOGS_PATH.to_owned()
}

fn default_log_filename() -> String {
    DEFAULT_LOG_FILENAME.to_owned()
}

fn default_logs_datetime_format() -> String {
    DEFAULT_LOGS_DATETIME_FORMAT.to_owned()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct LogConfig {
    /// Set log level
    #[clap(long, value_enum, default_value_t)]
    #[serde(default)]
    pub log_level: LogLevel,
    /// Set file log level
    /// By default, it will be the same as log level
    #[clap(long, value_enum)]
    pub file_log_level: Option<LogLevel>,
    /// Disable the log file
    #[clap(long)]
    #[serde(default)]
    pub disable_file_logging: bool,
    /// Disable the log filename date based
    /// If disabled, the log file will be named loyalty-daemon.log instead of YYYY-MM-DD.loyalty-daemon.log
    #[clap(long)]
    #[serde(default)]
    pub disable_file_log_date_based: bool,
    /// Disable the usage of colors in log
    #[clap(long)]
    #[serde(default)]
    pub disable_log_color: bool,
    /// Log filename, stored in the logs directory
    #[clap(long, default_value_t = default_log_filename())]
    #[serde(default = "default_log_filename")]
    pub filename_log: String,
    /// Logs directory
    ///
    /// By default it will be logs/ of the current directory.
    /// It must end with a / to be a valid folder.
    #[clap(long, default_value_t = default_logs_path())]
    #[serde(default = "default_logs_path")]
    pub logs_path: String,
    /// Change the datetime format used by the logger
    #[clap(long, default_value_t = default_logs_datetime_format())]
    #[serde(default = "default_logs_datetime_format")]
    pub datetime_format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            file_log_level: None,
            disable_file_logging: false,
            disable_file_log_date_based: false,
            disable_log_color: false,
            filename_log: default_log_filename(),
            logs_path: default_logs_path(),
            datetime_format: default_logs_datetime_format(),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Apply a JSON array of upstream events
    Ingest {
        /// Path of the events file
        #[clap(long)]
        events: String,
        /// Processing time in milliseconds, defaults to the current time
        #[clap(long)]
        now: Option<u64>,
    },
    /// Run one settlement pass against exported booking states
    Settle {
        /// Path of the JSON bookings export
        #[clap(long)]
        bookings: String,
        /// Settlement time in milliseconds, defaults to the current time
        #[clap(long)]
        now: Option<u64>,
    },
    /// Print the balance of an account
    Balance { account: u64 },
    /// Print referrers flagged for manual review
    ReferralsReport,
}

#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[clap(
    version = VERSION,
    about = "Loyalty daemon - points ledger, settlement and referral attribution"
)]
pub struct Config {
    /// Log configuration
    #[clap(flatten)]
    #[serde(default)]
    pub log: LogConfig,
    /// RocksDB tuning
    #[clap(flatten)]
    #[serde(default)]
    pub rocksdb: RocksDBConfig,
    /// Directory of the ledger database
    #[clap(long, default_value_t = default_dir_path())]
    #[serde(default = "default_dir_path")]
    pub dir_path: String,
    /// Business rules, only configurable through the config file
    #[clap(skip)]
    #[serde(default)]
    pub policy: LoyaltyPolicy,
    /// JSON File to load the configuration from
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub config_file: Option<String>,
    /// Generate the template at the `config_file` path
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub generate_config_template: bool,
    #[clap(subcommand)]
    #[serde(skip)]
    pub command: Option<Command>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_template_roundtrip() {
        let config = Config::parse_from(["loyalty_daemon", "--log-level", "debug", "balance", "7"]);
        assert_eq!(config.log.log_level, LogLevel::Debug);
        assert!(matches!(config.command, Some(Command::Balance { account: 7 })));

        let json = serde_json::to_string(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.policy, LoyaltyPolicy::default());
        assert_eq!(loaded.dir_path, DEFAULT_DIR_PATH);
        assert!(loaded.command.is_none());
    }

    #[test]
    fn test_policy_from_partial_file() {
        let json = r#"{"log": {"log_level": "warn"}, "policy": {"hold_period_millis": 1000}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.log.log_level, LogLevel::Warn);
        assert_eq!(config.policy.hold_period_millis, 1000);
        assert_eq!(config.policy.min_redemption_points, 500);
    }
}
