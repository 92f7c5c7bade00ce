// src/accrual.rs
//! Live pending-reward estimate between authoritative reads
//!
//! The contract's `getUserFullState` returns the pending reward total at the
//! moment it was read. Between reads the dashboard ticks once per second and
//! extrapolates from that baseline using the summed per-second rates of the
//! staked positions. A fresh read always replaces the estimate outright.

use alloy_primitives::U256;

use crate::types::RewardSnapshot;
use crate::units::{format_fixed, REWARD_DECIMALS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccrualState {
    /// No authoritative read yet; the displayed value is held at zero
    AwaitingFirstSnapshot,
    Ticking { baseline: RewardSnapshot },
}

#[derive(Debug, Clone)]
pub struct RewardAccrualEngine {
    state: AccrualState,
    displayed: U256,
}

impl Default for RewardAccrualEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RewardAccrualEngine {
    pub fn new() -> Self {
        Self {
            state: AccrualState::AwaitingFirstSnapshot,
            displayed: U256::ZERO,
        }
    }

    pub fn state(&self) -> AccrualState {
        self.state
    }

    pub fn is_ticking(&self) -> bool {
        matches!(self.state, AccrualState::Ticking { .. })
    }

    pub fn baseline(&self) -> Option<RewardSnapshot> {
        match self.state {
            AccrualState::Ticking { baseline } => Some(baseline),
            AccrualState::AwaitingFirstSnapshot => None,
        }
    }

    pub fn displayed(&self) -> U256 {
        self.displayed
    }

    /// Adopt a new authoritative read. Overrides any local estimate, higher or lower.
    pub fn on_snapshot(&mut self, snapshot: RewardSnapshot) {
        log::debug!(
            "Reward snapshot {} at {} (was displaying {})",
            snapshot.total_pending,
            snapshot.fetched_at,
            self.displayed
        );
        self.state = AccrualState::Ticking { baseline: snapshot };
        self.displayed = snapshot.total_pending;
    }

    /// Recompute the displayed value at `now` from the baseline and the rates of
    /// the currently active positions.
    pub fn on_tick<I>(&mut self, now: i64, active_rates: I)
    where
        I: IntoIterator<Item = U256>,
    {
        let baseline = match self.state {
            AccrualState::Ticking { baseline } => baseline,
            AccrualState::AwaitingFirstSnapshot => return,
        };

        let total_rate = active_rates
            .into_iter()
            .fold(U256::ZERO, |acc, rate| acc.saturating_add(rate));

        if total_rate.is_zero() {
            self.displayed = baseline.total_pending;
            return;
        }

        let elapsed = now.saturating_sub(baseline.fetched_at).max(0) as u64;
        let accrued = total_rate.saturating_mul(U256::from(elapsed));
        let estimate = baseline.total_pending.saturating_add(accrued);

        // Between snapshots the estimate only moves forward (clock skew, rate set shrinking)
        if estimate > self.displayed {
            self.displayed = estimate;
        }
    }

    /// Forget everything, e.g. after a wallet switch
    pub fn reset(&mut self) {
        self.state = AccrualState::AwaitingFirstSnapshot;
        self.displayed = U256::ZERO;
    }

    /// Displayed value as a decimal string with `shown` fractional digits
    pub fn render(&self, shown: u8) -> String {
        format_fixed(self.displayed, REWARD_DECIMALS, shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(value: u64, at: i64) -> RewardSnapshot {
        RewardSnapshot {
            total_pending: U256::from(value),
            fetched_at: at,
        }
    }

    #[test]
    fn test_stays_at_zero_before_first_snapshot() {
        let mut engine = RewardAccrualEngine::new();
        engine.on_tick(100, vec![U256::from(50u64)]);
        assert_eq!(engine.displayed(), U256::ZERO);
        assert_eq!(engine.state(), AccrualState::AwaitingFirstSnapshot);
    }

    #[test]
    fn test_five_ticks_at_rate_fifty() {
        let mut engine = RewardAccrualEngine::new();
        engine.on_snapshot(snapshot(1000, 0));
        for t in 1..=5 {
            engine.on_tick(t, vec![U256::from(50u64)]);
        }
        assert_eq!(engine.displayed(), U256::from(1250u64));
    }

    #[test]
    fn test_n_ticks_exact() {
        let rate = U256::from(31_709_791_983_764u64); // ~1 token/year in wei/s
        let start = U256::from(10u64).pow(U256::from(24u64));
        let mut engine = RewardAccrualEngine::new();
        engine.on_snapshot(RewardSnapshot {
            total_pending: start,
            fetched_at: 1_700_000_000,
        });
        let n = 86_400u64;
        for i in 1..=n {
            engine.on_tick(1_700_000_000 + i as i64, [rate]);
        }
        assert_eq!(engine.displayed(), start + rate * U256::from(n));
    }

    #[test]
    fn test_snapshot_overrides_higher_estimate() {
        let mut engine = RewardAccrualEngine::new();
        engine.on_snapshot(snapshot(1000, 0));
        engine.on_tick(10, [U256::from(100u64)]);
        assert_eq!(engine.displayed(), U256::from(2000u64));

        engine.on_snapshot(snapshot(1500, 10));
        assert_eq!(engine.displayed(), U256::from(1500u64));

        engine.on_tick(11, [U256::from(100u64)]);
        assert_eq!(engine.displayed(), U256::from(1600u64));
    }

    #[test]
    fn test_no_active_positions_freezes_at_baseline() {
        let mut engine = RewardAccrualEngine::new();
        engine.on_snapshot(snapshot(700, 0));
        engine.on_tick(60, Vec::<U256>::new());
        assert_eq!(engine.displayed(), U256::from(700u64));
    }

    #[test]
    fn test_monotonic_between_snapshots() {
        let mut engine = RewardAccrualEngine::new();
        engine.on_snapshot(snapshot(0, 100));
        engine.on_tick(110, [U256::from(10u64), U256::from(5u64)]);
        assert_eq!(engine.displayed(), U256::from(150u64));
        // clock went backwards
        engine.on_tick(105, [U256::from(10u64), U256::from(5u64)]);
        assert_eq!(engine.displayed(), U256::from(150u64));
        // one position dropped out of the active set
        engine.on_tick(111, [U256::from(10u64)]);
        assert_eq!(engine.displayed(), U256::from(150u64));
        engine.on_tick(120, [U256::from(10u64)]);
        assert_eq!(engine.displayed(), U256::from(200u64));
    }

    #[test]
    fn test_saturates_instead_of_wrapping() {
        let mut engine = RewardAccrualEngine::new();
        engine.on_snapshot(RewardSnapshot {
            total_pending: U256::MAX - U256::from(1u64),
            fetched_at: 0,
        });
        engine.on_tick(1_000, [U256::MAX]);
        assert_eq!(engine.displayed(), U256::MAX);
    }

    #[test]
    fn test_reset_and_render() {
        let mut engine = RewardAccrualEngine::new();
        engine.on_snapshot(snapshot(1_500_000_000_000_000_000, 0));
        assert_eq!(engine.render(6), "1.500000");
        engine.reset();
        assert!(!engine.is_ticking());
        assert_eq!(engine.render(6), "0.000000");
    }
}
