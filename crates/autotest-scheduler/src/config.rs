//! Scheduler configuration.

use autotest_core::Tier;
use serde::{Deserialize, Serialize};

/// Concurrent execution slots per tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_express")]
    pub express: usize,
    #[serde(default = "default_standard")]
    pub standard: usize,
    #[serde(default = "default_regression")]
    pub regression: usize,
}

fn default_express() -> usize {
    2
}

fn default_standard() -> usize {
    2
}

fn default_regression() -> usize {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            express: default_express(),
            standard: default_standard(),
            regression: default_regression(),
        }
    }
}

impl SchedulerConfig {
    /// Set the slot count for one tier.
    pub fn with_capacity(mut self, tier: Tier, slots: usize) -> Self {
        match tier {
            Tier::Express => self.express = slots,
            Tier::Standard => self.standard = slots,
            Tier::Regression => self.regression = slots,
        }
        self
    }

    pub fn capacity(&self, tier: Tier) -> usize {
        match tier {
            Tier::Express => self.express,
            Tier::Standard => self.standard,
            Tier::Regression => self.regression,
        }
    }

    pub fn total(&self) -> usize {
        self.express + self.standard + self.regression
    }
}
