use async_trait::async_trait;
use tracing::info;

/// Outbound account mail. Delivery failures surface as errors to the caller.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_activation(&self, email: &str, link: &str) -> anyhow::Result<()>;
    async fn send_password_reset(&self, email: &str, link: &str) -> anyhow::Result<()>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_activation(&self, email: &str, link: &str) -> anyhow::Result<()> {
        info!(
            to = %email,
            %link,
            "activation email: thank you for registering, follow the link to activate your account"
        );
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, link: &str) -> anyhow::Result<()> {
        info!(
            to = %email,
            %link,
            "password reset email: follow the link to set a new password, ignore if not requested"
        );
        Ok(())
    }
}
