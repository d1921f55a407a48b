//! Out-of-band delivery of password reset links

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::users::User;

/// Delivers messages to users
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a password reset link to a user
    async fn send_password_reset(&self, user: &User, link: &Url) -> anyhow::Result<()>;
}

/// Mailer shared between requests
pub type SharedMailer = Arc<dyn Mailer>;

/// Mailer that only logs the message
///
/// Used when no mail transport is configured, the link ends up in the logs
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, user: &User, link: &Url) -> anyhow::Result<()> {
        tracing::info!("Password reset link for {}: {link}", user.email);

        Ok(())
    }
}

/// Build the link to the reset page of the web client
pub fn password_reset_link(client_url: &Url, user: &User, token: &str) -> anyhow::Result<Url> {
    let mut link = client_url.join("auth/reset-password")?;

    link.query_pairs_mut()
        .append_pair("userId", &user.id.to_string())
        .append_pair("token", token);

    Ok(link)
}
