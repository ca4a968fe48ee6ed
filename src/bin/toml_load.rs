use clap::Parser;
use wallet_load::config::toml_config::LoadedTomlConfig;
use wallet_load::core::report;
use wallet_load::core::scenario::build_target_url;
use wallet_load::core::thresholds::THRESHOLDS_CROSSED_EXIT_CODE;
use wallet_load::core::ConfigProvider;
use wallet_load::utils::{logger, validation::Validate};
use wallet_load::{run_load_test, RunSettings, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-load")]
#[command(about = "Wallet load generator driven by a TOML file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "wallet-load.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the VU count from config
    #[arg(long)]
    vus: Option<usize>,

    /// Override the run duration from config, e.g. "30s"
    #[arg(long)]
    duration: Option<String>,

    /// Show what would be sent without generating load
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_logger(args.verbose, args.log_json);

    tracing::info!("🚀 Starting TOML-based wallet load test");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    // 套用命令列覆蓋設定後再解析
    let loaded = TomlConfig::from_file(&args.config).and_then(|loaded| {
        let mut raw = loaded.raw;
        if let Some(vus) = args.vus {
            raw.load.vus = Some(vus);
            tracing::info!("🔧 VUs overridden to: {}", vus);
        }
        if let Some(duration) = &args.duration {
            raw.load.duration = Some(duration.clone());
            tracing::info!("🔧 Duration overridden to: {}", duration);
        }
        raw.resolve()
    });

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No requests will be sent");
        perform_dry_run(&config)?;
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let settings = RunSettings {
        create_wallet: config.create_wallet(),
        verify_balance: config.verify_balance(),
        monitor: monitor_enabled,
        progress_interval: config.progress_interval(),
        summary_export: config.summary_export().map(str::to_string),
        thresholds: config.thresholds().clone(),
    };

    match run_load_test(&config, &settings).await {
        Ok(outcome) => {
            println!("{}", report::render_text(&outcome.summary, &outcome.breaches));
            if !outcome.passed() {
                eprintln!("❌ {} threshold(s) crossed", outcome.breaches.len());
                std::process::exit(THRESHOLDS_CROSSED_EXIT_CODE);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Load test failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code().max(1));
        }
    }

    Ok(())
}

fn display_config_summary(config: &LoadedTomlConfig) {
    tracing::info!("📋 Configuration Summary:");
    tracing::info!("  Target: {}", config.base_url());
    match config.planned_wallet_id() {
        Some(id) => tracing::info!("  Wallet: {}", id),
        None => tracing::info!("  Wallet: created before the run"),
    }
    tracing::info!("  VUs: {}", config.vus());
    tracing::info!("  Duration: {}", humantime::format_duration(config.duration()));
    match config.rps() {
        Some(rps) => tracing::info!("  Rate cap: {} req/s", rps),
        None => tracing::info!("  Rate cap: none"),
    }
    tracing::info!(
        "  Checks: {}",
        config
            .checks()
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if let Some(path) = config.summary_export() {
        tracing::info!("  Summary export: {}", path);
    }
}

fn perform_dry_run(config: &LoadedTomlConfig) -> Result<(), Box<dyn std::error::Error>> {
    let wallet = config.planned_wallet_id().unwrap_or("<created at run time>");
    let payload = serde_json::to_string(&config.operation())?;

    println!("POST {}", build_target_url(config.base_url(), wallet));
    println!("Content-Type: application/json");
    println!("Accept: application/json");
    println!();
    println!("{}", payload);
    println!();
    println!(
        "{} VUs for {}, rate cap {}",
        config.vus(),
        humantime::format_duration(config.duration()),
        config
            .rps()
            .map(|r| format!("{} req/s", r))
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(())
}
