use crate::config::{
    DEFAULT_BASE_URL, DEFAULT_DURATION, DEFAULT_GRACEFUL_STOP, DEFAULT_PROGRESS_INTERVAL,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_VUS, MAX_RPS, MAX_RUN_DURATION,
};
use crate::core::thresholds::Thresholds;
use crate::core::{Amount, Check, ConfigProvider, OperationRequest, OperationType};
use crate::utils::error::{LoadError, Result};
use crate::utils::validation::{self, parse_duration, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub target: TargetConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub load: LoadConfig,
    /// 省略時使用預設的兩個檢查
    pub checks: Option<Vec<Check>>,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub wallet_id: Option<String>,
    #[serde(default)]
    pub create_wallet: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadConfig {
    pub operation_type: Option<OperationType>,
    pub amount: Option<Amount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadConfig {
    pub vus: Option<usize>,
    pub duration: Option<String>,
    /// 省略或 0 代表不限速
    pub rps: Option<u32>,
    pub request_timeout: Option<String>,
    pub graceful_stop: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub summary_export: Option<String>,
    #[serde(default)]
    pub verify_balance: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub progress_interval: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Durations as parsed from the file, resolved once at load time.
#[derive(Debug, Clone, Copy)]
struct ResolvedDurations {
    duration: Duration,
    request_timeout: Duration,
    graceful_stop: Duration,
    progress_interval: Duration,
}

/// TOML 檔案配置，給 `toml-load` 使用
#[derive(Debug, Clone)]
pub struct LoadedTomlConfig {
    pub raw: TomlConfig,
    durations: ResolvedDurations,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<LoadedTomlConfig> {
        let content = std::fs::read_to_string(&path).map_err(LoadError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<LoadedTomlConfig> {
        let processed_content = Self::substitute_env_vars(content)?;

        let raw: TomlConfig =
            toml::from_str(&processed_content).map_err(|e| LoadError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        raw.resolve()
    }

    /// 替換環境變數 (例如 ${WALLET_ID})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| LoadError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 解析時間字串；覆蓋設定後可重新呼叫
    pub fn resolve(self) -> Result<LoadedTomlConfig> {
        let duration_of = |field: &str, value: &Option<String>, default: &str| {
            parse_duration(field, value.as_deref().unwrap_or(default))
        };

        let durations = ResolvedDurations {
            duration: duration_of("load.duration", &self.load.duration, DEFAULT_DURATION)?,
            request_timeout: duration_of(
                "load.request_timeout",
                &self.load.request_timeout,
                DEFAULT_REQUEST_TIMEOUT,
            )?,
            graceful_stop: duration_of(
                "load.graceful_stop",
                &self.load.graceful_stop,
                DEFAULT_GRACEFUL_STOP,
            )?,
            progress_interval: duration_of(
                "monitoring.progress_interval",
                &self.monitoring.as_ref().and_then(|m| m.progress_interval.clone()),
                DEFAULT_PROGRESS_INTERVAL,
            )?,
        };

        Ok(LoadedTomlConfig {
            raw: self,
            durations,
        })
    }
}

impl LoadedTomlConfig {
    pub fn create_wallet(&self) -> bool {
        self.raw.target.create_wallet
    }

    /// 實際會打的錢包；create_wallet 時於執行期才建立
    pub fn planned_wallet_id(&self) -> Option<&str> {
        if self.create_wallet() {
            None
        } else {
            self.wallet_id()
        }
    }

    pub fn verify_balance(&self) -> bool {
        self.raw.output.verify_balance
    }

    pub fn summary_export(&self) -> Option<&str> {
        self.raw.output.summary_export.as_deref()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.raw.thresholds
    }

    /// 取得監控設定
    pub fn monitoring_enabled(&self) -> bool {
        self.raw.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn progress_interval(&self) -> Duration {
        self.durations.progress_interval
    }
}

impl ConfigProvider for LoadedTomlConfig {
    fn base_url(&self) -> &str {
        &self.raw.target.base_url
    }

    fn wallet_id(&self) -> Option<&str> {
        self.raw.target.wallet_id.as_deref()
    }

    fn operation(&self) -> OperationRequest {
        OperationRequest {
            operation_type: self
                .raw
                .payload
                .operation_type
                .unwrap_or(OperationType::Deposit),
            amount: self.raw.payload.amount.unwrap_or_default(),
        }
    }

    fn vus(&self) -> usize {
        self.raw.load.vus.unwrap_or(DEFAULT_VUS)
    }

    fn duration(&self) -> Duration {
        self.durations.duration
    }

    fn rps(&self) -> Option<u32> {
        self.raw.load.rps.filter(|rps| *rps > 0)
    }

    fn request_timeout(&self) -> Duration {
        self.durations.request_timeout
    }

    fn graceful_stop(&self) -> Duration {
        self.durations.graceful_stop
    }

    fn checks(&self) -> Vec<Check> {
        self.raw.checks.clone().unwrap_or_else(Check::defaults)
    }
}

impl Validate for LoadedTomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("target.base_url", self.base_url())?;

        if !self.create_wallet() {
            let wallet_id = validation::validate_required_field(
                "target.wallet_id",
                &self.raw.target.wallet_id,
            )?;
            validation::validate_wallet_id("target.wallet_id", wallet_id)?;
        }

        validation::validate_positive_number("load.vus", self.vus(), 1)?;
        if let Some(rps) = self.raw.load.rps {
            validation::validate_range("load.rps", rps, 0, MAX_RPS)?;
        }
        validation::validate_non_zero_duration("load.duration", self.duration())?;
        validation::validate_max_duration("load.duration", self.duration(), MAX_RUN_DURATION)?;
        validation::validate_max_duration(
            "load.graceful_stop",
            self.graceful_stop(),
            MAX_RUN_DURATION,
        )?;
        validation::validate_non_zero_duration("load.request_timeout", self.request_timeout())?;
        validation::validate_non_zero_duration(
            "monitoring.progress_interval",
            self.progress_interval(),
        )?;

        if let Some(checks) = &self.raw.checks {
            if checks.is_empty() {
                return Err(LoadError::InvalidConfigValueError {
                    field: "checks".to_string(),
                    value: "[]".to_string(),
                    reason: "At least one check is required".to_string(),
                });
            }
        }

        if let Some(path) = self.summary_export() {
            validation::validate_path("output.summary_export", path)?;
            validation::validate_extension("output.summary_export", path, &["json"])?;
        }

        self.raw.thresholds.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[target]
base_url = "http://wallets.internal:8001"
wallet_id = "cab3ca61-1eb1-41a6-9323-999882cd1cc0"

[payload]
operation_type = "WITHDRAW"
amount = 0.5

[load]
vus = 100
duration = "30s"
rps = 500
request_timeout = "5s"
graceful_stop = "10s"

[[checks]]
kind = "status_is"
value = 200

[thresholds]
min_checks_pass_rate = 0.99
max_p95_ms = 250.0

[output]
summary_export = "out/summary.json"
verify_balance = true

[monitoring]
enabled = true
progress_interval = "2s"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.base_url(), "http://wallets.internal:8001");
        assert_eq!(config.operation().operation_type, OperationType::Withdraw);
        assert_eq!(config.operation().amount.cents(), 50);
        assert_eq!(config.vus(), 100);
        assert_eq!(config.duration(), Duration::from_secs(30));
        assert_eq!(config.rps(), Some(500));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.graceful_stop(), Duration::from_secs(10));
        assert_eq!(config.checks(), vec![Check::StatusIs(200)]);
        assert_eq!(config.thresholds().min_checks_pass_rate, Some(0.99));
        assert_eq!(config.summary_export(), Some("out/summary.json"));
        assert!(config.verify_balance());
        assert!(config.monitoring_enabled());
        assert_eq!(config.progress_interval(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config_uses_reference_defaults() {
        let toml_content = r#"
[target]
wallet_id = "cab3ca61-1eb1-41a6-9323-999882cd1cc0"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.operation(), OperationRequest::default());
        assert_eq!(config.vus(), 2000);
        assert_eq!(config.duration(), Duration::from_secs(60));
        assert_eq!(config.rps(), None);
        assert_eq!(config.checks(), Check::defaults());
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("WALLET_LOAD_TEST_WALLET", "0f6b2a4e-7c1d-4e7a-9b1c-2d3e4f5a6b7c");

        let toml_content = r#"
[target]
wallet_id = "${WALLET_LOAD_TEST_WALLET}"
base_url = "${WALLET_LOAD_TEST_UNSET_VAR}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.wallet_id(),
            Some("0f6b2a4e-7c1d-4e7a-9b1c-2d3e4f5a6b7c")
        );
        // 未設定的變數保留原樣，並在驗證時被拒絕
        assert_eq!(config.base_url(), "${WALLET_LOAD_TEST_UNSET_VAR}");
        assert!(config.validate().is_err());

        std::env::remove_var("WALLET_LOAD_TEST_WALLET");
    }

    #[test]
    fn test_missing_wallet_id_requires_create_wallet() {
        let config = TomlConfig::from_toml_str("[target]\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(LoadError::MissingConfigError { .. })
        ));

        let config = TomlConfig::from_toml_str("[target]\ncreate_wallet = true\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_created_wallet_overrides_configured_id() {
        let config = TomlConfig::from_toml_str(
            "[target]\nwallet_id = \"cab3ca61-1eb1-41a6-9323-999882cd1cc0\"\n",
        )
        .unwrap();
        assert_eq!(
            config.planned_wallet_id(),
            Some("cab3ca61-1eb1-41a6-9323-999882cd1cc0")
        );

        let config = TomlConfig::from_toml_str(
            "[target]\nwallet_id = \"cab3ca61-1eb1-41a6-9323-999882cd1cc0\"\ncreate_wallet = true\n",
        )
        .unwrap();
        assert_eq!(config.planned_wallet_id(), None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(TomlConfig::from_toml_str(
            "[target]\ncreate_wallet = true\n[load]\nduration = \"forever\"\n"
        )
        .is_err());
        assert!(TomlConfig::from_toml_str(
            "[target]\ncreate_wallet = true\n[payload]\namount = 0\n"
        )
        .is_err());

        let config =
            TomlConfig::from_toml_str("[target]\ncreate_wallet = true\n[load]\nvus = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config =
            TomlConfig::from_toml_str("checks = []\n[target]\ncreate_wallet = true\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rate_and_duration_limits() {
        let with_load = |load: &str| {
            TomlConfig::from_toml_str(&format!(
                "[target]\ncreate_wallet = true\n[load]\n{}\n",
                load
            ))
            .unwrap()
        };

        assert!(with_load("rps = 1000000000").validate().is_ok());
        assert!(with_load("rps = 4000000000").validate().is_err());
        assert!(with_load("duration = \"400years\"").validate().is_err());
        assert!(with_load("graceful_stop = \"400years\"").validate().is_err());

        let nan_threshold = TomlConfig::from_toml_str(
            "[target]\ncreate_wallet = true\n[thresholds]\nmax_p95_ms = nan\n",
        )
        .unwrap();
        assert!(nan_threshold.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[target]\nwallet_id = \"cab3ca61-1eb1-41a6-9323-999882cd1cc0\"\n[load]\nvus = 3\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.vus(), 3);
    }
}
