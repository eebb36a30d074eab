//! Throttled per-download progress delivery
//!
//! The download primitive reports raw `(bytes_received, bytes_total)`
//! samples at whatever rate the network produces them. Each download
//! identity has at most one subscriber, whose callback is gated by an
//! explicit rate limiter updated synchronously on every sample; there are
//! no timers, so the component is testable without wall-clock waits.
//! Percentages are a presentation concern and are not computed here.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::constants::progress;

/// A raw sample or terminal event for one download identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressSample {
    /// Bytes received so far out of the expected total
    Bytes { received: u64, total: u64 },

    /// The download failed; delivered unthrottled
    Failed { message: String },
}

/// Throttling configuration for one subscriber
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    /// Maximum number of byte-sample deliveries
    pub count: u32,

    /// Minimum spacing between deliveries
    pub interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            count: progress::DEFAULT_CALLBACK_COUNT,
            interval: progress::DEFAULT_CALLBACK_INTERVAL,
        }
    }
}

/// Rate limiter state for one identity
///
/// Admission is decided synchronously per sample: a sample passes when
/// deliveries remain and the spacing from the previous delivery is at least
/// the configured interval.
#[derive(Debug)]
struct Throttle {
    fires_remaining: u32,
    interval: Duration,
    last_fire: Option<Instant>,
}

impl Throttle {
    fn new(config: ThrottleConfig) -> Self {
        Self {
            fires_remaining: config.count,
            interval: config.interval,
            last_fire: None,
        }
    }

    fn admit(&mut self, now: Instant) -> bool {
        if self.fires_remaining == 0 {
            return false;
        }
        if let Some(last) = self.last_fire {
            if now.duration_since(last) < self.interval {
                return false;
            }
        }
        self.fires_remaining -= 1;
        self.last_fire = Some(now);
        true
    }
}

/// Subscriber callback: receives admitted samples
pub type ProgressCallback = Box<dyn Fn(ProgressSample) + Send + Sync>;

struct Subscriber {
    callback: ProgressCallback,
    throttle: Throttle,
}

/// Per-identity progress pub/sub with throttled delivery
#[derive(Default)]
pub struct ProgressTracker {
    subscribers: Mutex<HashMap<String, Subscriber>>,
}

impl ProgressTracker {
    /// Create a tracker with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the subscriber for an identity, replacing any existing one
    pub fn attach(&self, identity: &str, callback: ProgressCallback, config: ThrottleConfig) {
        debug!("Attaching progress subscriber for {}", identity);
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.insert(
            identity.to_string(),
            Subscriber {
                callback,
                throttle: Throttle::new(config),
            },
        );
    }

    /// Unregister an identity; removing an unknown identity is a no-op
    pub fn remove(&self, identity: &str) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if subscribers.remove(identity).is_some() {
            debug!("Removed progress subscriber for {}", identity);
        }
    }

    /// Feed a raw sample for an identity
    ///
    /// Byte samples are throttled; failure events always reach the
    /// subscriber. Samples for identities without a subscriber are dropped.
    pub fn report(&self, identity: &str, sample: ProgressSample) {
        self.report_at(identity, sample, Instant::now())
    }

    fn report_at(&self, identity: &str, sample: ProgressSample, now: Instant) {
        let mut subscribers = self.subscribers.lock().unwrap();
        let Some(subscriber) = subscribers.get_mut(identity) else {
            return;
        };
        let deliver = match &sample {
            ProgressSample::Bytes { .. } => subscriber.throttle.admit(now),
            ProgressSample::Failed { .. } => true,
        };
        if deliver {
            (subscriber.callback)(sample);
        }
    }
}
