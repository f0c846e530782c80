//! Pushover owner notifications.
//!
//! Posts form data `{token, user, title, message}` to the Pushover messages
//! endpoint. Every failure is logged and reported as `false`; nothing here
//! ever reaches the submitter.

use crate::config::PushoverConfig;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use wishlist_core::store::Notifier;

/// Upper bound on one Pushover request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when talking to Pushover.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No application token configured
    #[error("Pushover app token is not configured")]
    MissingAppToken,

    /// HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// HTTP request failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// API returned an error
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

/// Pushover API client.
#[derive(Clone)]
pub struct PushoverNotifier {
    client: Client,
    app_token: Option<String>,
    api_url: String,
}

impl PushoverNotifier {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Client` if the HTTP client cannot be built.
    pub fn new(config: &PushoverConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            app_token: config.app_token.clone(),
            api_url: config.api_url.clone(),
        })
    }

    /// Whether an application token is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.app_token.is_some()
    }

    /// Send one notification.
    ///
    /// # Errors
    ///
    /// - `MissingAppToken` when no token is configured
    /// - `RequestFailed` on transport failure or timeout
    /// - `ApiError` on any non-200 response
    pub async fn send(&self, user_key: &str, title: &str, message: &str) -> Result<(), NotifyError> {
        let token = self.app_token.as_deref().ok_or(NotifyError::MissingAppToken)?;

        let response = self
            .client
            .post(&self.api_url)
            .form(&[
                ("token", token),
                ("user", user_key),
                ("title", title),
                ("message", message),
            ])
            .send()
            .await
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(NotifyError::ApiError {
                    status: status.as_u16(),
                    message: body,
                })
            },
        }
    }
}

impl Notifier for PushoverNotifier {
    fn notify_owner<'a>(
        &'a self,
        owner_key: &'a str,
        title: &'a str,
        message: &'a str,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            if owner_key.is_empty() || !self.is_configured() {
                debug!("Pushover not configured, skipping notification");
                return false;
            }

            match self.send(owner_key, title, message).await {
                Ok(()) => {
                    metrics::counter!("wishlist_notifications_total", "outcome" => "sent")
                        .increment(1);
                    true
                },
                Err(e) => {
                    warn!(error = %e, "Pushover send failed");
                    metrics::counter!("wishlist_notifications_total", "outcome" => "failed")
                        .increment(1);
                    false
                },
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::{Form, Router, extract::State, http::StatusCode as HttpStatus, routing::post};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<HashMap<String, String>>>>;

    /// Local stand-in for the Pushover endpoint answering with `status`.
    async fn fake_pushover(status: HttpStatus) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/1/messages.json",
                post(
                    move |State(captured): State<Captured>,
                          Form(form): Form<HashMap<String, String>>| async move {
                        captured.lock().unwrap().push(form);
                        status
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/1/messages.json"), captured)
    }

    fn notifier(app_token: Option<&str>, api_url: String) -> PushoverNotifier {
        PushoverNotifier::new(&PushoverConfig {
            app_token: app_token.map(ToString::to_string),
            api_url,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_posts_form_fields() {
        let (url, captured) = fake_pushover(HttpStatus::OK).await;
        let notifier = notifier(Some("app-token"), url);

        let sent = notifier
            .notify_owner("user-key", "Birthday", "Someone reserved \u{201c}Book\u{201d}")
            .await;

        assert!(sent);
        let forms = captured.lock().unwrap().clone();
        assert_eq!(forms.len(), 1);
        assert_eq!(forms[0]["token"], "app-token");
        assert_eq!(forms[0]["user"], "user-key");
        assert_eq!(forms[0]["title"], "Birthday");
        assert_eq!(forms[0]["message"], "Someone reserved \u{201c}Book\u{201d}");
    }

    #[tokio::test]
    async fn test_non_200_reports_false() {
        let (url, _captured) = fake_pushover(HttpStatus::BAD_REQUEST).await;
        let notifier = notifier(Some("app-token"), url);

        assert!(!notifier.notify_owner("user-key", "t", "m").await);
        let err = notifier.send("user-key", "t", "m").await.unwrap_err();
        assert!(matches!(err, NotifyError::ApiError { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_missing_token_skips_request() {
        let (url, captured) = fake_pushover(HttpStatus::OK).await;
        let notifier = notifier(None, url);

        assert!(!notifier.notify_owner("user-key", "t", "m").await);
        assert!(captured.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_false() {
        let notifier = notifier(Some("app-token"), "http://127.0.0.1:9/unreachable".to_string());
        assert!(!notifier.notify_owner("user-key", "t", "m").await);
    }
}
