//! Static per-endpoint admission policies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::penalty::{EscalationCurve, ProgressiveBlockPolicy};
use crate::error::{GatekeeperError, Result};

/// Quota, window and blocking bounds for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPolicy {
    /// Requests admitted per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Sliding window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// First-offense block in seconds
    #[serde(default = "default_base_block_secs")]
    pub base_block_secs: u64,

    /// Longest block in seconds
    #[serde(default = "default_max_block_secs")]
    pub max_block_secs: u64,

    /// How blocks grow with repeated offenses
    #[serde(default)]
    pub escalation: EscalationCurve,
}

fn default_max_requests() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_base_block_secs() -> u64 {
    60
}

fn default_max_block_secs() -> u64 {
    300
}

impl Default for EndpointPolicy {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            base_block_secs: default_base_block_secs(),
            max_block_secs: default_max_block_secs(),
            escalation: EscalationCurve::default(),
        }
    }
}

impl EndpointPolicy {
    /// A policy admitting `max_requests` per `window_secs`, with default blocking.
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
            ..Self::default()
        }
    }

    /// Override the block duration bounds.
    pub fn with_blocks(mut self, base_block_secs: u64, max_block_secs: u64) -> Self {
        self.base_block_secs = base_block_secs;
        self.max_block_secs = max_block_secs;
        self
    }

    /// Override the escalation curve.
    pub fn with_escalation(mut self, escalation: EscalationCurve) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn base_block(&self) -> Duration {
        Duration::from_secs(self.base_block_secs)
    }

    pub fn max_block(&self) -> Duration {
        Duration::from_secs(self.max_block_secs)
    }

    /// The block policy this endpoint policy describes.
    pub fn block_policy(&self) -> ProgressiveBlockPolicy {
        ProgressiveBlockPolicy::new(self.base_block(), self.max_block(), self.window())
            .with_curve(self.escalation)
    }

    /// Check that every bound is positive and the block bounds are ordered.
    pub fn validate(&self, endpoint: &str) -> Result<()> {
        let invalid = |reason: &str| GatekeeperError::InvalidPolicy {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        if self.max_requests == 0 {
            return Err(invalid("max_requests must be positive"));
        }
        if self.window_secs == 0 {
            return Err(invalid("window_secs must be positive"));
        }
        if self.base_block_secs == 0 {
            return Err(invalid("base_block_secs must be positive"));
        }
        if self.max_block_secs < self.base_block_secs {
            return Err(invalid("max_block_secs must not be less than base_block_secs"));
        }
        Ok(())
    }
}
