use crate::domain::model::{Check, OperationRequest, Sample};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn wallet_id(&self) -> Option<&str>;
    fn operation(&self) -> OperationRequest;
    fn vus(&self) -> usize;
    fn duration(&self) -> Duration;
    /// `None` lifts the cap
    fn rps(&self) -> Option<u32>;
    fn request_timeout(&self) -> Duration;
    fn graceful_stop(&self) -> Duration;
    fn checks(&self) -> Vec<Check>;
}

/// One unit of work a virtual user repeats until the run ends.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;
    fn target_url(&self) -> &str;
    fn check_names(&self) -> Vec<String>;
    /// Never fails: transport errors are folded into the returned sample.
    async fn iteration(&self, vu: usize) -> Sample;
}
