//! Transactional email delivery.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Upper bound on one provider round trip.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("email provider API key is not configured")]
    MissingCredentials,

    #[error("HTTP request to email provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("email provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },
}

/// A plain-text message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// [`Mailer`] backed by the Resend HTTP API.
///
/// A missing key is not a construction error: every send then fails with
/// [`MailError::MissingCredentials`] so callers can degrade gracefully.
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: Option<String>,
    from: String,
    endpoint: String,
    timeout: Duration,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>, from: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            from: from.into(),
            endpoint: RESEND_ENDPOINT.to_owned(),
            timeout: SEND_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let api_key = self.api_key.as_deref().ok_or(MailError::MissingCredentials)?;

        let payload = ResendPayload {
            from: &self.from,
            to: [&email.to],
            subject: &email.subject,
            text: &email.text,
            reply_to: email.reply_to.as_deref(),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Provider { status: status.as_u16(), body });
        }

        debug!(to = %email.to, "email accepted by provider");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn send_without_key_fails_before_any_request() {
        // Unroutable endpoint: the call must not get as far as the network.
        let mailer = ResendMailer::new(None, "from@example.com").with_endpoint("http://127.0.0.1:9");
        assert!(!mailer.has_credentials());

        let err = mailer
            .send(OutgoingEmail {
                to: "ops@example.com".into(),
                subject: "s".into(),
                text: "t".into(),
                reply_to: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::MissingCredentials));
    }

    #[tokio::test]
    async fn unresponsive_provider_times_out() {
        // Accept connections and never answer.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mailer = ResendMailer::new(Some("re_123".into()), "from@example.com")
            .with_endpoint(format!("http://{addr}/emails"))
            .with_timeout(Duration::from_millis(200));
        let email = OutgoingEmail {
            to: "ops@example.com".into(),
            subject: "s".into(),
            text: "t".into(),
            reply_to: None,
        };

        let err = tokio::time::timeout(Duration::from_secs(10), mailer.send(email))
            .await
            .expect("send must not hang")
            .unwrap_err();
        assert!(matches!(&err, MailError::Http(e) if e.is_timeout()), "{err}");
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert!(!ResendMailer::new(Some(" ".into()), "f").has_credentials());
        assert!(ResendMailer::new(Some("re_123".into()), "f").has_credentials());
    }
}
