use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::EmailProvider;

const API_URL: &str = "https://api.resend.com/emails";

pub struct ResendEmailProvider {
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl ResendEmailProvider {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailProvider for ResendEmailProvider {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        self.client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
            .send()
            .await
            .context("failed to reach email provider")?
            .error_for_status()
            .context("email provider returned error")?;

        Ok(())
    }
}
