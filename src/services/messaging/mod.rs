pub mod twilio;

use async_trait::async_trait;

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()>;
}

/// Used when Twilio credentials are not configured.
pub struct DisabledSmsProvider;

#[async_trait]
impl SmsProvider for DisabledSmsProvider {
    async fn send_message(&self, to: &str, _body: &str) -> anyhow::Result<()> {
        tracing::debug!(to, "SMS disabled, dropping message");
        Ok(())
    }
}

/// Best-effort dispatch, mirroring the email side: failures are logged, never
/// propagated.
pub async fn dispatch(provider: &dyn SmsProvider, to: &str, body: &str) {
    if to.is_empty() {
        return;
    }
    if let Err(e) = provider.send_message(to, body).await {
        tracing::warn!(error = %e, to, "failed to send SMS");
    }
}
