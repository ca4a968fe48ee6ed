use crate::core::{Check, ConfigProvider, OperationRequest, ResponseSnapshot, Sample, Scenario};
use crate::utils::error::Result;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Instant;

pub const USER_AGENT: &str = concat!("wallet-load/", env!("CARGO_PKG_VERSION"));

/// `{base_url}/api/v1/wallets/{wallet_id}/operation`, wallet id kept verbatim
pub fn build_target_url(base_url: &str, wallet_id: &str) -> String {
    format!(
        "{}/api/v1/wallets/{}/operation",
        base_url.trim_end_matches('/'),
        wallet_id
    )
}

/// Repeatedly POSTs the same wallet operation and checks each response.
pub struct WalletOperationScenario {
    client: Client,
    target_url: String,
    payload: String,
    operation: OperationRequest,
    checks: Vec<Check>,
}

impl WalletOperationScenario {
    pub fn new<C: ConfigProvider>(config: &C, wallet_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        let operation = config.operation();
        let payload = serde_json::to_string(&operation)?;
        let target_url = build_target_url(config.base_url(), wallet_id);

        tracing::debug!("Scenario target: POST {} body={}", target_url, payload);

        Ok(Self {
            client,
            target_url,
            payload,
            operation,
            checks: config.checks(),
        })
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn operation(&self) -> OperationRequest {
        self.operation
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    fn evaluate(&self, snapshot: &ResponseSnapshot) -> Vec<bool> {
        self.checks.iter().map(|check| check.evaluate(snapshot)).collect()
    }
}

#[async_trait::async_trait]
impl Scenario for WalletOperationScenario {
    fn name(&self) -> &str {
        "wallet_operation"
    }

    fn target_url(&self) -> &str {
        &self.target_url
    }

    fn check_names(&self) -> Vec<String> {
        self.checks.iter().map(Check::name).collect()
    }

    async fn iteration(&self, vu: usize) -> Sample {
        let started = Instant::now();

        let response = self
            .client
            .post(&self.target_url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(self.payload.clone())
            .send()
            .await;

        let (snapshot, error) = match response {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.text().await {
                    Ok(body) => (
                        ResponseSnapshot {
                            status: Some(status),
                            body,
                        },
                        None,
                    ),
                    Err(e) => (
                        ResponseSnapshot {
                            status: Some(status),
                            body: String::new(),
                        },
                        Some(format!("failed to read body: {}", e)),
                    ),
                }
            }
            Err(e) => (ResponseSnapshot::default(), Some(e.to_string())),
        };
        let latency = started.elapsed();

        if let Some(err) = &error {
            tracing::trace!("VU {} request error after {:?}: {}", vu, latency, err);
        }

        Sample {
            latency,
            status: snapshot.status,
            check_results: self.evaluate(&snapshot),
            error,
        }
    }
}
