pub mod signature;
pub mod stripe;

use std::collections::HashMap;

use async_trait::async_trait;

/// Payment purpose carried through checkout-session metadata. The processor
/// only stores string metadata, so both variants round-trip as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentKind {
    Deposit,
    Final,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Deposit => "deposit",
            PaymentKind::Final => "final",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(PaymentKind::Deposit),
            "final" => Some(PaymentKind::Final),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub amount_cents: i64,
    pub product_name: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session and return its redirect URL.
    async fn create_checkout_session(
        &self,
        req: CheckoutSessionRequest,
    ) -> anyhow::Result<CheckoutSession>;
}
