use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A successful charge as reported by a gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayApproval {
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    /// Extra gateway reference (e.g. a bank transfer reference), if any.
    pub reference: Option<String>,
}

/// A declined charge. Declines are data, not faults: they are persisted as
/// failed payment attempts and never surfaced as errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayDecline {
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GatewayOutcome {
    Approved(GatewayApproval),
    Declined(GatewayDecline),
}

impl GatewayOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, GatewayOutcome::Approved(_))
    }
}

/// Pluggable payment gateway capability. One implementation is registered
/// per payment method; all of them receive the amount, the currency and the
/// opaque method-specific fields from the request body.
#[async_trait]
pub trait GatewaySimulator: Send + Sync {
    async fn charge(&self, amount: Decimal, currency: &str, fields: &Value) -> GatewayOutcome;
}
