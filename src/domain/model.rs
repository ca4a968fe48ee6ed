use crate::utils::error::{LoadError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Deposit,
    Withdraw,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Deposit => "DEPOSIT",
            OperationType::Withdraw => "WITHDRAW",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEPOSIT" => Ok(OperationType::Deposit),
            "WITHDRAW" => Ok(OperationType::Withdraw),
            _ => Err(LoadError::InvalidConfigValueError {
                field: "operation_type".to_string(),
                value: s.to_string(),
                reason: "Allowed values: DEPOSIT, WITHDRAW".to_string(),
            }),
        }
    }
}

/// Monetary amount in hundredths.
///
/// The wallet service accepts positive amounts with at most two decimal
/// places. Whole amounts serialize as JSON integers so the default payload
/// reads `"amount": 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount {
    cents: u64,
}

impl Amount {
    pub fn from_cents(cents: u64) -> Result<Self> {
        if cents == 0 {
            return Err(LoadError::InvalidConfigValueError {
                field: "amount".to_string(),
                value: "0".to_string(),
                reason: "Amount must be greater than 0".to_string(),
            });
        }
        Ok(Self { cents })
    }

    pub fn cents(&self) -> u64 {
        self.cents
    }

    pub fn as_f64(&self) -> f64 {
        self.cents as f64 / 100.0
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self { cents: 100 }
    }
}

impl FromStr for Amount {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| LoadError::InvalidConfigValueError {
            field: "amount".to_string(),
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("Amount must be a positive decimal number"));
        }
        if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("Amount allows at most two decimal places"));
        }

        let whole: u64 = whole
            .parse()
            .map_err(|_| invalid("Amount is out of range"))?;
        let fraction: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().unwrap_or(0) * 10,
            _ => fraction.parse::<u64>().unwrap_or(0),
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(|| invalid("Amount is out of range"))?;

        Amount::from_cents(cents)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cents % 100 == 0 {
            write!(f, "{}", self.cents / 100)
        } else {
            write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.cents % 100 == 0 {
            serializer.serialize_u64(self.cents / 100)
        } else {
            serializer.serialize_f64(self.as_f64())
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawAmount {
            Integer(u64),
            Float(f64),
            Text(String),
        }

        let text = match RawAmount::deserialize(deserializer)? {
            RawAmount::Integer(n) => n.to_string(),
            RawAmount::Float(n) => n.to_string(),
            RawAmount::Text(s) => s,
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// JSON body of `POST /api/v1/wallets/{walletId}/operation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub operation_type: OperationType,
    pub amount: Amount,
}

impl Default for OperationRequest {
    fn default() -> Self {
        Self {
            operation_type: OperationType::Deposit,
            amount: Amount::default(),
        }
    }
}

/// What a check gets to look at. `status` is `None` when no response arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: Option<u16>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Check {
    StatusIs(u16),
    BodyContains(String),
}

impl Check {
    pub fn name(&self) -> String {
        match self {
            Check::StatusIs(code) => format!("status is {}", code),
            Check::BodyContains(needle) => format!("response body contains {}", needle),
        }
    }

    pub fn evaluate(&self, response: &ResponseSnapshot) -> bool {
        match self {
            Check::StatusIs(code) => response.status == Some(*code),
            Check::BodyContains(needle) => response.body.contains(needle.as_str()),
        }
    }

    /// `status is 200` and `response body contains new_balance`
    pub fn defaults() -> Vec<Check> {
        vec![
            Check::StatusIs(200),
            Check::BodyContains("new_balance".to_string()),
        ]
    }
}

/// Outcome of one VU iteration.
#[derive(Debug, Clone)]
pub struct Sample {
    pub latency: Duration,
    pub status: Option<u16>,
    pub check_results: Vec<bool>,
    pub error: Option<String>,
}

impl Sample {
    pub fn all_checks_passed(&self) -> bool {
        self.check_results.iter().all(|passed| *passed)
    }
}
