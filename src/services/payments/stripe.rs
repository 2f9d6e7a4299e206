use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{CheckoutSession, CheckoutSessionRequest, PaymentProvider};

const API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeClient {
    secret_key: String,
    client: reqwest::Client,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: String,
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        req: CheckoutSessionRequest,
    ) -> anyhow::Result<CheckoutSession> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), req.success_url),
            ("cancel_url".into(), req.cancel_url),
            ("line_items[0][quantity]".into(), "1".into()),
            ("line_items[0][price_data][currency]".into(), "usd".into()),
            (
                "line_items[0][price_data][unit_amount]".into(),
                req.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                req.product_name,
            ),
        ];
        for (key, value) in req.metadata {
            form.push((format!("metadata[{}]", key), value));
        }

        let response: SessionResponse = self
            .client
            .post(format!("{}/checkout/sessions", API_BASE))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .context("failed to reach Stripe")?
            .error_for_status()
            .context("Stripe rejected checkout session")?
            .json()
            .await
            .context("failed to parse Stripe session response")?;

        Ok(CheckoutSession {
            id: response.id,
            url: response.url,
        })
    }
}
