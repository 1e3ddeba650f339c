use async_trait::async_trait;
use qfs_common::{QfsError, Result};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::llm_trait::LlmClient;
use crate::types::GenerateRequest;

/// LLM client wrapper that spaces requests to a fixed rate
pub struct RateLimitedClient<C> {
    inner: C,
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl<C: LlmClient> RateLimitedClient<C> {
    /// Wrap `inner` so that at most `requests_per_second` requests start per second
    pub fn new(inner: C, requests_per_second: f64) -> Result<Self> {
        if !(requests_per_second.is_finite() && requests_per_second > 0.0) {
            return Err(QfsError::config(format!(
                "Request rate must be positive, got {}",
                requests_per_second
            )));
        }

        Ok(Self {
            inner,
            interval: Duration::from_secs_f64(1.0 / requests_per_second),
            next_slot: Mutex::new(None),
        })
    }

    /// Wait until the next request slot is available
    async fn acquire(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(next) if next > now => next,
                _ => now,
            };
            *next_slot = Some(slot + self.interval);
            slot
        };

        if slot > Instant::now() {
            debug!("Rate limit: waiting {:?}", slot - Instant::now());
            tokio::time::sleep_until(slot).await;
        }
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for RateLimitedClient<C> {
    async fn generate(&self, request: GenerateRequest) -> Result<String> {
        self.acquire().await;
        self.inner.generate(request).await
    }

    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        self.acquire().await;
        self.inner.embed(model, text).await
    }

    async fn test_connection(&self) -> Result<bool> {
        self.inner.test_connection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for CountingClient {
        async fn generate(&self, _request: GenerateRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("ok".to_string())
        }

        async fn embed(&self, _model: &str, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0])
        }

        async fn test_connection(&self) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        let client = CountingClient { calls: AtomicUsize::new(0) };
        assert!(RateLimitedClient::new(client, 0.0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_spaced() {
        let client = CountingClient { calls: AtomicUsize::new(0) };
        let limited = RateLimitedClient::new(client, 2.0).unwrap();

        let started = Instant::now();
        for _ in 0..3 {
            limited.embed("m", "t").await.unwrap();
        }

        // First request is immediate, then one every 500ms
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert!(started.elapsed() < Duration::from_millis(1500));
        assert_eq!(limited.inner.calls.load(Ordering::SeqCst), 3);
    }
}
