//! Subscriber sinks for hub tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use wishlist_core::hub::{DeliveryError, SubscriberSink};

type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + 'a>>;

/// Records every payload it is handed.
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Arc<str>>>,
}

impl RecordingSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Payloads received so far, oldest first
    pub async fn received(&self) -> Vec<String> {
        self.received
            .lock()
            .await
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Payloads parsed back into JSON values
    ///
    /// # Panics
    ///
    /// Panics if a payload is not valid JSON.
    #[allow(clippy::expect_used)]
    pub async fn received_json(&self) -> Vec<serde_json::Value> {
        self.received()
            .await
            .iter()
            .map(|p| serde_json::from_str(p).expect("payload should be JSON"))
            .collect()
    }
}

impl SubscriberSink for RecordingSink {
    fn send_text(&self, payload: Arc<str>) -> SendFuture<'_> {
        Box::pin(async move {
            self.received.lock().await.push(payload);
            Ok(())
        })
    }
}

/// Fails every send, like a peer that already went away.
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    /// Create a failing sink
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// How many sends were attempted
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl SubscriberSink for FailingSink {
    fn send_text(&self, _payload: Arc<str>) -> SendFuture<'_> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(DeliveryError::Closed) })
    }
}

/// Never completes a send within `delay`, like a peer with a full buffer.
#[derive(Debug)]
pub struct StalledSink {
    delay: Duration,
}

impl StalledSink {
    /// Create a sink whose sends take `delay`
    #[must_use]
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay })
    }
}

impl SubscriberSink for StalledSink {
    fn send_text(&self, _payload: Arc<str>) -> SendFuture<'_> {
        let delay = self.delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(())
        })
    }
}
