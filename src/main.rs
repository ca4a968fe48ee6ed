use clap::Parser;
use wallet_load::core::report;
use wallet_load::core::thresholds::THRESHOLDS_CROSSED_EXIT_CODE;
use wallet_load::utils::{logger, validation::Validate};
use wallet_load::{run_load_test, CliConfig, RunSettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.log_json);

    tracing::info!("Starting wallet-load CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let settings = RunSettings {
        create_wallet: config.create_wallet,
        verify_balance: config.verify_balance,
        monitor: config.monitor,
        progress_interval: config.progress_interval,
        summary_export: config.summary_export.clone(),
        thresholds: config.thresholds(),
    };

    match run_load_test(&config, &settings).await {
        Ok(outcome) => {
            println!("{}", report::render_text(&outcome.summary, &outcome.breaches));
            if let Some(path) = &outcome.export_path {
                println!("📁 Summary saved to: {}", path);
            }
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
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
