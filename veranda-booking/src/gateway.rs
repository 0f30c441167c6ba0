use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use veranda_core::gateway::{GatewayApproval, GatewayDecline, GatewayOutcome, GatewaySimulator};

use crate::models::PaymentMethod;

fn short_ref() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

fn approval(transaction_id: String, reference: Option<String>) -> GatewayOutcome {
    GatewayOutcome::Approved(GatewayApproval {
        transaction_id,
        timestamp: Utc::now(),
        reference,
    })
}

/// Simulated card processor. Declines any card number ending in "0000";
/// everything else is approved after the configured latency. Illustrative
/// fixture, not real validation.
pub struct CreditCardGateway {
    latency: Duration,
}

impl CreditCardGateway {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl GatewaySimulator for CreditCardGateway {
    async fn charge(&self, _amount: Decimal, _currency: &str, fields: &Value) -> GatewayOutcome {
        tokio::time::sleep(self.latency).await;

        let card_number = fields
            .get("card_number")
            .or_else(|| fields.get("cardNumber"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        if card_number.ends_with("0000") {
            return GatewayOutcome::Declined(GatewayDecline {
                message: "Card declined".to_string(),
                code: "CARD_DECLINED".to_string(),
            });
        }

        approval(format!("TXN_{}", short_ref()), None)
    }
}

pub struct PaypalGateway {
    latency: Duration,
}

impl PaypalGateway {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl GatewaySimulator for PaypalGateway {
    async fn charge(&self, _amount: Decimal, _currency: &str, _fields: &Value) -> GatewayOutcome {
        tokio::time::sleep(self.latency).await;
        approval(format!("PP_{}", short_ref()), None)
    }
}

pub struct BankTransferGateway {
    latency: Duration,
}

impl BankTransferGateway {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl GatewaySimulator for BankTransferGateway {
    async fn charge(&self, _amount: Decimal, _currency: &str, _fields: &Value) -> GatewayOutcome {
        tokio::time::sleep(self.latency).await;
        approval(
            format!("BT_{}", short_ref()),
            Some(format!("REF_{}", Utc::now().timestamp_millis())),
        )
    }
}

pub struct StripeGateway {
    latency: Duration,
}

impl StripeGateway {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl GatewaySimulator for StripeGateway {
    async fn charge(&self, _amount: Decimal, _currency: &str, _fields: &Value) -> GatewayOutcome {
        tokio::time::sleep(self.latency).await;
        let id = Uuid::new_v4().simple().to_string();
        approval(format!("pi_{}", &id[..24]), None)
    }
}

/// Maps payment methods to their registered simulator. `free` has no
/// simulator on purpose: zero-amount bookings are settled synthetically by
/// the payment processor and never reach a gateway.
pub struct GatewayRegistry {
    gateways: HashMap<PaymentMethod, Arc<dyn GatewaySimulator>>,
}

impl GatewayRegistry {
    /// Registry with the four reference simulators sharing one latency.
    pub fn with_simulators(latency: Duration) -> Self {
        let mut registry = Self {
            gateways: HashMap::new(),
        };
        registry.register(
            PaymentMethod::CreditCard,
            Arc::new(CreditCardGateway::new(latency)),
        );
        registry.register(PaymentMethod::Paypal, Arc::new(PaypalGateway::new(latency)));
        registry.register(
            PaymentMethod::BankTransfer,
            Arc::new(BankTransferGateway::new(latency)),
        );
        registry.register(PaymentMethod::Stripe, Arc::new(StripeGateway::new(latency)));
        registry
    }

    pub fn register(&mut self, method: PaymentMethod, simulator: Arc<dyn GatewaySimulator>) {
        self.gateways.insert(method, simulator);
    }

    pub fn get(&self, method: PaymentMethod) -> Option<Arc<dyn GatewaySimulator>> {
        self.gateways.get(&method).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[tokio::test]
    async fn test_card_ending_0000_declines() {
        let gateway = CreditCardGateway::new(Duration::ZERO);
        let outcome = gateway
            .charge(dec!(300), "USD", &json!({"card_number": "4242424240000000"}))
            .await;

        match outcome {
            GatewayOutcome::Declined(decline) => {
                assert_eq!(decline.message, "Card declined");
                assert_eq!(decline.code, "CARD_DECLINED");
            }
            GatewayOutcome::Approved(_) => panic!("expected decline"),
        }
    }

    #[tokio::test]
    async fn test_card_approval_has_txn_prefix() {
        let gateway = CreditCardGateway::new(Duration::ZERO);
        let outcome = gateway
            .charge(dec!(300), "USD", &json!({"card_number": "4242424242421234"}))
            .await;

        match outcome {
            GatewayOutcome::Approved(approval) => {
                assert!(approval.transaction_id.starts_with("TXN_"));
            }
            GatewayOutcome::Declined(_) => panic!("expected approval"),
        }
    }

    #[tokio::test]
    async fn test_registry_has_no_free_gateway() {
        let registry = GatewayRegistry::with_simulators(Duration::ZERO);
        assert!(registry.get(PaymentMethod::CreditCard).is_some());
        assert!(registry.get(PaymentMethod::Stripe).is_some());
        assert!(registry.get(PaymentMethod::Free).is_none());
    }
}
