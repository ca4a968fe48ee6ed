pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::thresholds::Thresholds;
#[cfg(feature = "cli")]
use crate::core::{Amount, Check, ConfigProvider, OperationRequest, OperationType};
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "cli")]
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://0.0.0.0:8001";
pub const DEFAULT_WALLET_ID: &str = "cab3ca61-1eb1-41a6-9323-999882cd1cc0";
pub const DEFAULT_VUS: usize = 2000;
pub const DEFAULT_RPS: u32 = 2000;
pub const DEFAULT_DURATION: &str = "1m";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "60s";
pub const DEFAULT_GRACEFUL_STOP: &str = "30s";
pub const DEFAULT_PROGRESS_INTERVAL: &str = "5s";

/// One permit per nanosecond is the finest spacing the rate limiter has
pub const MAX_RPS: u32 = 1_000_000_000;
pub const MAX_RUN_DURATION: std::time::Duration = std::time::Duration::from_secs(365 * 24 * 60 * 60);

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "wallet-load")]
#[command(about = "Load generator for the wallet operation endpoint")]
pub struct CliConfig {
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, default_value = DEFAULT_WALLET_ID)]
    pub wallet_id: String,

    /// DEPOSIT or WITHDRAW
    #[arg(long = "operation", default_value = "DEPOSIT")]
    pub operation_type: OperationType,

    #[arg(long, default_value = "1")]
    pub amount: Amount,

    /// Number of virtual users
    #[arg(long, default_value_t = DEFAULT_VUS)]
    pub vus: usize,

    #[arg(long, default_value = DEFAULT_DURATION, value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Requests per second across all VUs, 0 for no cap
    #[arg(long, default_value_t = DEFAULT_RPS)]
    pub rps: u32,

    #[arg(long, default_value = DEFAULT_REQUEST_TIMEOUT, value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// How long in-flight iterations may run past the duration
    #[arg(long, default_value = DEFAULT_GRACEFUL_STOP, value_parser = humantime::parse_duration)]
    pub graceful_stop: Duration,

    #[arg(long, default_value = DEFAULT_PROGRESS_INTERVAL, value_parser = humantime::parse_duration)]
    pub progress_interval: Duration,

    /// Create a fresh wallet before the run instead of using --wallet-id
    #[arg(long)]
    pub create_wallet: bool,

    /// Compare the wallet balance before and after the run
    #[arg(long)]
    pub verify_balance: bool,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub summary_export: Option<String>,

    /// Minimum fraction of passing checks, e.g. 0.99
    #[arg(long)]
    pub threshold_checks: Option<f64>,

    #[arg(long)]
    pub threshold_p95_ms: Option<f64>,

    /// Maximum fraction of requests without a response
    #[arg(long)]
    pub threshold_transport_errors: Option<f64>,

    #[arg(long, help = "Sample CPU and memory of this process during the run")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_checks_pass_rate: self.threshold_checks,
            max_p95_ms: self.threshold_p95_ms,
            max_transport_error_rate: self.threshold_transport_errors,
        }
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn wallet_id(&self) -> Option<&str> {
        Some(&self.wallet_id)
    }

    fn operation(&self) -> OperationRequest {
        OperationRequest {
            operation_type: self.operation_type,
            amount: self.amount,
        }
    }

    fn vus(&self) -> usize {
        self.vus
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn rps(&self) -> Option<u32> {
        (self.rps > 0).then_some(self.rps)
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    fn graceful_stop(&self) -> Duration {
        self.graceful_stop
    }

    fn checks(&self) -> Vec<Check> {
        Check::defaults()
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("base_url", &self.base_url)?;
        if !self.create_wallet {
            validation::validate_wallet_id("wallet_id", &self.wallet_id)?;
        }
        validation::validate_positive_number("vus", self.vus, 1)?;
        validation::validate_range("rps", self.rps, 0, MAX_RPS)?;
        validation::validate_non_zero_duration("duration", self.duration)?;
        validation::validate_max_duration("duration", self.duration, MAX_RUN_DURATION)?;
        validation::validate_max_duration("graceful_stop", self.graceful_stop, MAX_RUN_DURATION)?;
        validation::validate_non_zero_duration("timeout", self.timeout)?;
        validation::validate_non_zero_duration("progress_interval", self.progress_interval)?;
        if let Some(path) = &self.summary_export {
            validation::validate_path("summary_export", path)?;
            validation::validate_extension("summary_export", path, &["json"])?;
        }
        self.thresholds().validate()
    }
}
