pub mod engine;
pub mod metrics;
pub mod rate_limit;
pub mod report;
pub mod scenario;
pub mod thresholds;
pub mod wallet_api;

pub use crate::domain::model::{
    Amount, Check, OperationRequest, OperationType, ResponseSnapshot, Sample,
};
pub use crate::domain::ports::{ConfigProvider, Scenario, Storage};
pub use crate::utils::error::Result;
