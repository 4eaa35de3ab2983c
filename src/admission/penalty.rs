//! Progressive blocking of repeat offenders.
//!
//! Once an identity overflows its window quota it is blocked outright for a
//! period that grows with each further offense, up to a cap. An identity that
//! then stays under quota for a full window after its block expires is
//! forgiven and starts again from a first offense.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// How block durations grow with the offense count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationCurve {
    /// `base * 2^(n - 1)`, capped
    #[default]
    Exponential,
    /// `base * n`, capped
    Linear,
}

/// Per-identity blocking state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockState {
    /// End of the current (or most recent) block
    pub blocked_until: Option<Instant>,
    /// Overflow episodes since the identity was last forgiven
    pub offense_count: u32,
}

impl BlockState {
    /// True when the identity carries no block history at all.
    pub fn is_clean(&self) -> bool {
        self.blocked_until.is_none() && self.offense_count == 0
    }
}

/// Computes block durations and decides whether an identity is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressiveBlockPolicy {
    /// Duration of a first-offense block
    base: Duration,
    /// Upper bound on any single block
    max: Duration,
    /// Quiet period after a block expires before the offense count resets
    clean_window: Duration,
    /// Growth curve
    curve: EscalationCurve,
}

impl ProgressiveBlockPolicy {
    /// Create an exponential policy.
    ///
    /// `clean_window` is normally the rate limit window of the controller the
    /// policy belongs to.
    pub fn new(base: Duration, max: Duration, clean_window: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            clean_window,
            curve: EscalationCurve::Exponential,
        }
    }

    /// Use a different escalation curve.
    pub fn with_curve(mut self, curve: EscalationCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Block length for the given offense count. Zero offenses means no block.
    pub fn block_duration(&self, offense_count: u32) -> Duration {
        if offense_count == 0 {
            return Duration::ZERO;
        }

        let factor = match self.curve {
            EscalationCurve::Exponential => 1u32.checked_shl(offense_count - 1),
            EscalationCurve::Linear => Some(offense_count),
        };

        factor
            .and_then(|f| self.base.checked_mul(f))
            .map_or(self.max, |d| d.min(self.max))
    }

    /// True iff a block is recorded and has not yet expired.
    pub fn is_blocked(&self, state: &BlockState, now: Instant) -> bool {
        matches!(state.blocked_until, Some(until) if now < until)
    }

    /// Time left on an active block.
    pub fn remaining_block(&self, state: &BlockState, now: Instant) -> Option<Duration> {
        match state.blocked_until {
            Some(until) if now < until => Some(until - now),
            _ => None,
        }
    }

    /// Register an overflow at `now` and start the escalated block.
    pub fn on_overflow(&self, state: BlockState, now: Instant) -> BlockState {
        let offense_count = state.offense_count.saturating_add(1);
        BlockState {
            blocked_until: Some(now + self.block_duration(offense_count)),
            offense_count,
        }
    }

    /// Forgive an identity that has stayed clean for a full window since its
    /// last block expired.
    ///
    /// Any later overflow would have pushed `blocked_until` past `now`, so a
    /// block that ended at least one window ago proves a clean window.
    pub fn on_clean_window(&self, state: BlockState, now: Instant) -> BlockState {
        match state.blocked_until {
            Some(until) if now.saturating_duration_since(until) >= self.clean_window => {
                BlockState::default()
            }
            None => BlockState::default(),
            _ => state,
        }
    }
}
