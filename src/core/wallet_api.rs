use crate::core::scenario::USER_AGENT;
use crate::core::{OperationRequest, OperationType};
use crate::utils::error::{LoadError, Result};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Balance in hundredths, as stored by the wallet service (`Numeric(10, 2)`).
pub type Cents = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWallet {
    pub wallet_uuid: String,
    pub balance: Cents,
}

/// Setup/teardown calls against the wallet service around a load run.
pub struct WalletApiClient {
    client: Client,
    base_url: String,
}

impl WalletApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `POST /api/v1/wallets/`
    pub async fn create_wallet(&self) -> Result<CreatedWallet> {
        let url = format!("{}/api/v1/wallets/", self.base_url);
        tracing::debug!("Creating wallet via POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let body = Self::json_body(response, "create wallet").await?;

        let wallet_uuid = body
            .get("wallet_uuid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LoadError::WalletApiError {
                message: format!("create wallet response has no wallet_uuid: {}", body),
            })?
            .to_string();
        let balance = body.get("balance").map(parse_balance).transpose()?.unwrap_or(0);

        tracing::info!("🆕 Created wallet {} (balance {})", wallet_uuid, format_cents(balance));
        Ok(CreatedWallet {
            wallet_uuid,
            balance,
        })
    }

    /// `GET /api/v1/wallets/{wallet_id}`
    pub async fn get_balance(&self, wallet_id: &str) -> Result<Cents> {
        let url = format!("{}/api/v1/wallets/{}", self.base_url, wallet_id);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LoadError::WalletApiError {
                message: format!("wallet {} not found", wallet_id),
            });
        }

        let body = Self::json_body(response, "get balance").await?;
        let balance = body.get("balance").ok_or_else(|| LoadError::WalletApiError {
            message: format!("balance response has no balance field: {}", body),
        })?;
        parse_balance(balance)
    }

    async fn json_body(response: reqwest::Response, action: &str) -> Result<serde_json::Value> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(LoadError::WalletApiError {
                message: format!("{} returned {}: {}", action, status, text),
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Balances arrive as JSON numbers or decimal strings (`"101.00"`), or
/// nested as `{"wallet_uuid": ..., "balance": <number>}`.
pub fn parse_balance(value: &serde_json::Value) -> Result<Cents> {
    if let Some(inner) = value.as_object().and_then(|o| o.get("balance")) {
        return parse_balance(inner);
    }
    let as_float = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    as_float
        .filter(|v| v.is_finite())
        .map(|v| (v * 100.0).round() as Cents)
        .ok_or_else(|| LoadError::WalletApiError {
            message: format!("unparseable balance: {}", value),
        })
}

pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Consistent,
    /// Off by no more than the requests whose outcome is unknown
    Inconclusive,
    Mismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReconciliation {
    pub wallet_id: String,
    pub initial_cents: Cents,
    pub final_cents: Cents,
    pub expected_delta_cents: Cents,
    pub observed_delta_cents: Cents,
    pub uncertain_requests: u64,
    pub status: ReconciliationStatus,
}

impl BalanceReconciliation {
    /// `applied` counts 200 responses. `uncertain` counts requests that
    /// may or may not have been committed (timeouts, aborted iterations).
    pub fn reconcile(
        wallet_id: &str,
        initial_cents: Cents,
        final_cents: Cents,
        operation: &OperationRequest,
        applied: u64,
        uncertain: u64,
    ) -> Self {
        let step = operation.amount.cents() as Cents;
        let step = match operation.operation_type {
            OperationType::Deposit => step,
            OperationType::Withdraw => -step,
        };
        let expected = step.saturating_mul(applied as Cents);
        let observed = final_cents - initial_cents;
        let widest = expected.saturating_add(step.saturating_mul(uncertain as Cents));
        let (low, high) = if expected <= widest {
            (expected, widest)
        } else {
            (widest, expected)
        };

        let status = if observed == expected {
            ReconciliationStatus::Consistent
        } else if uncertain > 0 && (low..=high).contains(&observed) {
            ReconciliationStatus::Inconclusive
        } else {
            ReconciliationStatus::Mismatch
        };

        Self {
            wallet_id: wallet_id.to_string(),
            initial_cents,
            final_cents,
            expected_delta_cents: expected,
            observed_delta_cents: observed,
            uncertain_requests: uncertain,
            status,
        }
    }
}
