//! Verification mail delivery
//!
//! [`Notifier`] has two implementations, chosen at startup by whether the
//! mail relay is configured: [`HttpMailer`] posts to an HTTP relay, and
//! [`ConsoleNotifier`] logs the code for the operator and always succeeds.
//! Account flows see only the trait.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::auth::OTP_TTL_MINUTES;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("Mail relay unreachable: {0}")]
    Transport(String),

    #[error("Mail relay rejected message: HTTP {status}")]
    Rejected { status: u16 },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a verification code to `email`
    async fn send_otp(&self, email: &str, name: &str, otp: &str) -> Result<(), NotifyError>;

    /// Short label for logs and /health
    fn kind(&self) -> &'static str;
}

/// Development notifier: logs the code instead of sending it
#[derive(Debug, Default, Clone)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send_otp(&self, email: &str, name: &str, otp: &str) -> Result<(), NotifyError> {
        info!(to = %email, name = %name, otp = %otp, "OTP email (mail relay not configured)");
        warn!("Set MAIL_API_URL and MAIL_API_KEY to deliver verification mail");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "console"
    }
}

#[derive(Debug, Serialize)]
struct MailMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: String,
}

/// Delivers mail through a JSON HTTP relay (`POST {from,to,subject,html}`
/// with a bearer key)
pub struct HttpMailer {
    client: Client,
    url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            from: from.into(),
        })
    }
}

fn otp_email_html(name: &str, otp: &str) -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
         <h1>Callisto</h1>\
         <h2>Email Verification</h2>\
         <p>Hi {name},</p>\
         <p>Use the following code to verify your email address:</p>\
         <h1 style=\"letter-spacing: 8px; font-family: monospace;\">{otp}</h1>\
         <p>This code expires in {ttl} minutes. If you didn't request it, ignore this email.</p>\
         </div>",
        name = name,
        otp = otp,
        ttl = OTP_TTL_MINUTES,
    )
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn send_otp(&self, email: &str, name: &str, otp: &str) -> Result<(), NotifyError> {
        let message = MailMessage {
            from: &self.from,
            to: email,
            subject: "Callisto - Email Verification OTP",
            html: otp_email_html(name, otp),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }

        info!(to = %email, "Verification email sent");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "http-relay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_notifier_always_succeeds() {
        let notifier = ConsoleNotifier;
        assert!(notifier
            .send_otp("ada@example.com", "Ada", "123456")
            .await
            .is_ok());
        assert_eq!(notifier.kind(), "console");
    }

    #[test]
    fn test_email_body_contains_code() {
        let html = otp_email_html("Ada", "042042");
        assert!(html.contains("Hi Ada"));
        assert!(html.contains("042042"));
        assert!(html.contains("10 minutes"));
    }
}
