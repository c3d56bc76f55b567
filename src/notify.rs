//! Notifications outside the forge: direct messages and email.
//!
//! Delivery is delegated to a webhook that fronts whatever directory or
//! mail service the team uses. Authentication belongs to that service;
//! shepherd only forwards a bearer token when one is set.

use std::{env, time::Duration};

use serde::Serialize;

/// Environment variable holding the webhook bearer token.
pub const TOKEN_ENV: &str = "SHEPHERD_NOTIFY_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook error: {status} - {message}")]
    Webhook { status: u16, message: String },
}

/// Sends notifications to people.
pub trait Notifier {
    fn send_direct(&self, user: &str, message: &str) -> Result<(), NotifyError>;

    fn send_email(&self, to: &[String], subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Request body posted to the webhook.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum Delivery<'a> {
    Direct {
        user: &'a str,
        message: &'a str,
    },
    Email {
        to: &'a [String],
        subject: &'a str,
        body: &'a str,
    },
}

/// Posts notification requests as JSON to a configured URL.
pub struct WebhookNotifier {
    url: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    /// Build a notifier for `url`, picking up the token from the environment.
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(format!("shepherd/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            url: url.into(),
            token: env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
            client,
        })
    }

    fn post(&self, delivery: &Delivery<'_>) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.url).json(delivery);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(NotifyError::Webhook { status, message })
        }
    }
}

impl Notifier for WebhookNotifier {
    fn send_direct(&self, user: &str, message: &str) -> Result<(), NotifyError> {
        self.post(&Delivery::Direct { user, message })
    }

    fn send_email(&self, to: &[String], subject: &str, body: &str) -> Result<(), NotifyError> {
        self.post(&Delivery::Email { to, subject, body })
    }
}
