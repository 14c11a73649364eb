//! Send-timing obfuscation.
//!
//! Every real send waits a uniform random delay in
//! `[min_delay, max_delay]`; if the previous send finished less than
//! `min_delay` ago, the deficit is added on top. The result is that
//! consecutive sends on one channel are never closer than `min_delay` in
//! wall-clock time, and the exact spacing carries no information about when
//! the application actually produced the message.
//!
//! `last_send` is updated after the sleep completes, not before, so the
//! spacing guarantee is measured between actual wire writes.

use std::time::Duration;

use rand::Rng;
use tokio::{
    sync::Mutex,
    time::{Instant, sleep},
};

/// Timing parameters for send pacing and cover traffic.
#[derive(Debug, Clone, Copy)]
pub struct ObfuscationConfig {
    /// Minimum spacing between consecutive sends.
    pub min_delay: Duration,
    /// Upper bound of the per-send random delay.
    pub max_delay: Duration,
    /// Base interval between cover-traffic messages (relay side).
    pub dummy_interval: Duration,
    /// Random jitter added to the cover-traffic interval.
    pub dummy_jitter: Duration,
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(1500),
            dummy_interval: Duration::from_secs(30),
            dummy_jitter: Duration::from_secs(30),
        }
    }
}

impl ObfuscationConfig {
    /// A configuration with no pacing and no cover-traffic wait, for tests.
    pub fn fast() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            dummy_interval: Duration::from_millis(1),
            dummy_jitter: Duration::ZERO,
        }
    }

    /// Draw the wait until the next cover-traffic message:
    /// `dummy_interval + Uniform[0, dummy_jitter]`.
    pub fn next_dummy_interval(&self) -> Duration {
        let jitter_ms = self.dummy_jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.dummy_interval + Duration::from_millis(extra)
    }
}

/// Enforces randomized spacing between sends on one channel.
#[derive(Debug)]
pub struct TrafficObfuscator {
    config: ObfuscationConfig,
    last_send: Mutex<Option<Instant>>,
}

impl TrafficObfuscator {
    /// New obfuscator; no send has happened yet.
    pub fn new(config: ObfuscationConfig) -> Self {
        Self { config, last_send: Mutex::new(None) }
    }

    /// The configuration in effect.
    pub fn config(&self) -> &ObfuscationConfig {
        &self.config
    }

    /// Suspend until this send is allowed to hit the wire.
    ///
    /// Bounded: the wait never exceeds `max_delay + min_delay`.
    pub async fn pace(&self) {
        let delay = {
            let last = self.last_send.lock().await;

            let min_ms = self.config.min_delay.as_millis() as u64;
            let max_ms = (self.config.max_delay.as_millis() as u64).max(min_ms);
            let base = Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms));

            // elapsed() advances between calls; saturate rather than trust
            // the guard's reading twice
            let deficit = match *last {
                Some(at) => self.config.min_delay.saturating_sub(at.elapsed()),
                None => Duration::ZERO,
            };

            base + deficit
        };

        sleep(delay).await;

        *self.last_send.lock().await = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn consecutive_sends_are_min_delay_apart() {
        let config = ObfuscationConfig {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            ..ObfuscationConfig::default()
        };
        let obfuscator = TrafficObfuscator::new(config);

        let mut previous: Option<Instant> = None;
        for _ in 0..100 {
            obfuscator.pace().await;
            let now = Instant::now();
            if let Some(at) = previous {
                assert!(
                    now - at >= config.min_delay,
                    "sends {:?} apart, below min_delay",
                    now - at
                );
            }
            previous = Some(now);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_bounded() {
        let config = ObfuscationConfig {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            ..ObfuscationConfig::default()
        };
        let obfuscator = TrafficObfuscator::new(config);

        for _ in 0..20 {
            let before = Instant::now();
            obfuscator.pace().await;
            let waited = Instant::now() - before;
            assert!(waited <= config.max_delay + config.min_delay + Duration::from_millis(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_config_does_not_hang() {
        let obfuscator = TrafficObfuscator::new(ObfuscationConfig::fast());
        for _ in 0..10 {
            obfuscator.pace().await;
        }
    }

    #[test]
    fn dummy_interval_within_bounds() {
        let config = ObfuscationConfig {
            dummy_interval: Duration::from_millis(100),
            dummy_jitter: Duration::from_millis(50),
            ..ObfuscationConfig::default()
        };
        for _ in 0..50 {
            let interval = config.next_dummy_interval();
            assert!(interval >= Duration::from_millis(100));
            assert!(interval <= Duration::from_millis(150));
        }
    }
}
