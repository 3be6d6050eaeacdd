//! Prefetch job configuration and per-job context.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::progress::PrefetchProgress;
use super::throttler::PrefetchThrottler;

/// Default maximum chunk length in metres.
pub const DEFAULT_CHUNK_LENGTH_M: f64 = 5_000.0;

/// Default minimum delay between two chunk requests.
///
/// Public data APIs (Overpass in particular) rate limit aggressively.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(1_000);

/// Default timeout for one chunk request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default multiplier applied to the request delay while throttled.
pub const DEFAULT_IDLE_DELAY_FACTOR: f64 = 3.0;

/// Tunables shared by every prefetch job.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchJobConfig {
    /// Maximum length of one chunk in metres.
    pub chunk_length_m: f64,
    /// Minimum delay between chunk requests.
    pub request_delay: Duration,
    /// Timeout for one chunk request.
    pub request_timeout: Duration,
    /// Delay multiplier while the throttler reports throttled.
    pub idle_delay_factor: f64,
}

impl Default for PrefetchJobConfig {
    fn default() -> Self {
        Self {
            chunk_length_m: DEFAULT_CHUNK_LENGTH_M,
            request_delay: DEFAULT_REQUEST_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            idle_delay_factor: DEFAULT_IDLE_DELAY_FACTOR,
        }
    }
}

/// Everything one cache job needs from the coordinator.
#[derive(Clone)]
pub struct PrefetchContext {
    config: PrefetchJobConfig,
    cancel: CancellationToken,
    throttler: Arc<dyn PrefetchThrottler>,
    progress: Arc<dyn Fn(PrefetchProgress) + Send + Sync>,
}

impl PrefetchContext {
    pub fn new(
        config: PrefetchJobConfig,
        cancel: CancellationToken,
        throttler: Arc<dyn PrefetchThrottler>,
        progress: Arc<dyn Fn(PrefetchProgress) + Send + Sync>,
    ) -> Self {
        Self {
            config,
            cancel,
            throttler,
            progress,
        }
    }

    pub fn config(&self) -> &PrefetchJobConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the job is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Delay before the next request, stretched while throttled.
    pub fn request_delay(&self) -> Duration {
        if self.throttler.should_throttle() {
            self.config
                .request_delay
                .mul_f64(self.config.idle_delay_factor.max(1.0))
        } else {
            self.config.request_delay
        }
    }

    /// Forward a progress update to the coordinator.
    pub fn report(&self, progress: PrefetchProgress) {
        (self.progress)(progress);
    }
}

impl std::fmt::Debug for PrefetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchContext")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("throttle", &self.throttler.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefetch::{AlwaysThrottle, NeverThrottle};

    fn context(throttler: Arc<dyn PrefetchThrottler>) -> PrefetchContext {
        PrefetchContext::new(
            PrefetchJobConfig::default(),
            CancellationToken::new(),
            throttler,
            Arc::new(|_| {}),
        )
    }

    #[test]
    fn test_delay_stretched_while_throttled() {
        assert_eq!(context(Arc::new(NeverThrottle)).request_delay(), DEFAULT_REQUEST_DELAY);
        assert_eq!(
            context(Arc::new(AlwaysThrottle)).request_delay(),
            DEFAULT_REQUEST_DELAY.mul_f64(DEFAULT_IDLE_DELAY_FACTOR)
        );
    }

    #[test]
    fn test_factor_below_one_never_speeds_up() {
        let mut ctx = context(Arc::new(AlwaysThrottle));
        ctx.config.idle_delay_factor = 0.1;
        assert_eq!(ctx.request_delay(), DEFAULT_REQUEST_DELAY);
    }
}
