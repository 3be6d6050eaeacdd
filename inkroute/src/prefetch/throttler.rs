//! Prefetch throttling abstraction.
//!
//! Jobs only ask "should I slow down?", not why. The production answer is
//! viewer presence: with no WebSocket viewer connected the device is
//! probably unattended, so prefetch backs off.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Throttle states as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    /// Prefetch runs at the configured pace.
    Active,
    /// Prefetch runs with stretched delays.
    Throttled,
}

impl ThrottleState {
    /// Get a short description for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleState::Active => "Active",
            ThrottleState::Throttled => "Throttled",
        }
    }
}

impl fmt::Display for ThrottleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Determines whether prefetching should slow down.
///
/// # Implementors
///
/// - `ViewerThrottle` - throttles while no viewer is connected
/// - `NeverThrottle` - testing: always full pace
/// - `AlwaysThrottle` - testing: always throttled
pub trait PrefetchThrottler: Send + Sync {
    /// Check if prefetching should slow down.
    ///
    /// Called before every inter-request delay.
    fn should_throttle(&self) -> bool;

    /// Get current throttle state for display/debugging.
    fn state(&self) -> ThrottleState {
        if self.should_throttle() {
            ThrottleState::Throttled
        } else {
            ThrottleState::Active
        }
    }
}

/// Throttles while the viewer count is zero.
#[derive(Debug, Default)]
pub struct ViewerThrottle {
    viewers: AtomicUsize,
}

impl ViewerThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current number of connected viewers.
    pub fn set_viewers(&self, count: usize) {
        self.viewers.store(count, Ordering::Relaxed);
    }

    pub fn viewers(&self) -> usize {
        self.viewers.load(Ordering::Relaxed)
    }
}

impl PrefetchThrottler for ViewerThrottle {
    fn should_throttle(&self) -> bool {
        self.viewers() == 0
    }
}

/// Testing throttler that never throttles.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverThrottle;

impl PrefetchThrottler for NeverThrottle {
    fn should_throttle(&self) -> bool {
        false
    }
}

/// Testing throttler that always throttles.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysThrottle;

impl PrefetchThrottler for AlwaysThrottle {
    fn should_throttle(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_throttle_state_display() {
        assert_eq!(format!("{}", ThrottleState::Active), "Active");
        assert_eq!(format!("{}", ThrottleState::Throttled), "Throttled");
    }

    #[test]
    fn test_viewer_throttle() {
        let throttle = ViewerThrottle::new();
        assert!(throttle.should_throttle());
        assert_eq!(throttle.state(), ThrottleState::Throttled);

        throttle.set_viewers(2);
        assert!(!throttle.should_throttle());
        assert_eq!(throttle.state(), ThrottleState::Active);
    }

    #[test]
    fn test_trait_object_usage() {
        let throttler: Arc<dyn PrefetchThrottler> = Arc::new(NeverThrottle);
        assert!(!throttler.should_throttle());

        let throttler: Arc<dyn PrefetchThrottler> = Arc::new(AlwaysThrottle);
        assert!(throttler.should_throttle());
    }
}
