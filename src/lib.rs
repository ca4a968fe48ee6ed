pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::{run_load_test, RunOutcome, RunSettings};
pub use config::{cli::LocalStorage, toml_config::TomlConfig};
pub use core::{engine::LoadEngine, scenario::WalletOperationScenario};
pub use utils::error::{LoadError, Result};
