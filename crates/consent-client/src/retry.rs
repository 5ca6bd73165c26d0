//! Declarative retry policy
//!
//! Retry state (attempt counter, current delay) belongs to a single
//! in-flight call, never to the client. The policy only classifies
//! failures and computes delays; the loop itself lives with the
//! transport in [`crate::http`].

use std::sync::Arc;
use std::time::Duration;

/// Per-attempt context handed to a custom retry predicate
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// HTTP status of the failed attempt, None for transport failures
    pub status: Option<u16>,
    /// Attempts already made (0 on the first failure)
    pub attempts_made: u32,
    /// Fully resolved request URL
    pub url: String,
    /// HTTP method of the request
    pub method: String,
}

/// Custom retry predicate; fully overrides status-code classification
pub type ShouldRetry = Arc<dyn Fn(&RetryContext) -> bool + Send + Sync>;

/// Retry behavior for a client or a single request
#[derive(Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_factor: f64,
    /// HTTP statuses that warrant a retry
    pub retryable_status_codes: Vec<u16>,
    /// Whether transport-level failures are retried
    pub retry_on_network_error: bool,
    /// Optional predicate that overrides status-code classification
    pub should_retry: Option<ShouldRetry>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            retryable_status_codes: vec![408, 425, 429, 500, 502, 503, 504],
            retry_on_network_error: true,
            should_retry: None,
        }
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .field("retry_on_network_error", &self.retry_on_network_error)
            .field("should_retry", &self.should_retry.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl RetryConfig {
    /// Policy that never retries
    pub fn none() -> Self {
        Self { max_retries: 0, retry_on_network_error: false, ..Default::default() }
    }

    /// Set the maximum retry count
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Replace the retryable status set
    pub fn with_retryable_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retryable_status_codes = codes;
        self
    }

    /// Enable or disable retrying transport failures
    pub fn with_retry_on_network_error(mut self, enabled: bool) -> Self {
        self.retry_on_network_error = enabled;
        self
    }

    /// Install a custom retry predicate
    pub fn with_should_retry(
        mut self,
        predicate: impl Fn(&RetryContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Whether a failed HTTP response should be retried
    ///
    /// The custom predicate, when present, fully overrides the
    /// status-code set.
    pub fn is_retryable_response(&self, status: u16, ctx: &RetryContext) -> bool {
        match &self.should_retry {
            Some(predicate) => predicate(ctx),
            None => self.retryable_status_codes.contains(&status),
        }
    }

    /// Whether a transport-level failure should be retried
    pub fn is_retryable_network_error(&self, ctx: &RetryContext) -> bool {
        match &self.should_retry {
            Some(predicate) => predicate(ctx),
            None => self.retry_on_network_error,
        }
    }

    /// Delay before retry number `retry` (1-based)
    ///
    /// Retry k waits `initial_delay * backoff_factor^(k-1)`.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        self.initial_delay.mul_f64(self.backoff_factor.powi(exponent))
    }
}
