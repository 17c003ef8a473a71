//! Upload polling delay with bounded multiplicative backoff.

use crate::config::UploadConfig;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadDelay {
    initial: Duration,
    min: Duration,
    max: Duration,
    change_rate: f64,
    current: Duration,
}

impl UploadDelay {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            initial: config.initial_delay,
            min: config.min_delay,
            max: config.max_delay,
            change_rate: config.delay_change_rate,
            current: config.initial_delay,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Back to the base delay (nothing to upload).
    pub fn reset_to_initial(&mut self) {
        self.current = self.initial;
    }

    /// Down to the floor (a batch reached a terminal outcome).
    pub fn reset_to_min(&mut self) {
        self.current = self.min;
    }

    /// Grow by `1 + change_rate`, capped at the ceiling (retryable failure).
    pub fn back_off(&mut self) {
        self.current = self.current.mul_f64(1.0 + self.change_rate).min(self.max);
    }
}
