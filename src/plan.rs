// src/plan.rs
//! Staking plans offered by the pool contract

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StakingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanIndex {
    ThreeMonths = 0,
    SixMonths = 1,
    TwelveMonths = 2,
}

impl PlanIndex {
    pub const ALL: [PlanIndex; 3] = [
        PlanIndex::ThreeMonths,
        PlanIndex::SixMonths,
        PlanIndex::TwelveMonths,
    ];

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn lock_days(&self) -> u64 {
        match self {
            PlanIndex::ThreeMonths => 90,
            PlanIndex::SixMonths => 180,
            PlanIndex::TwelveMonths => 365,
        }
    }

    pub fn apy_percent(&self) -> u32 {
        match self {
            PlanIndex::ThreeMonths => 10,
            PlanIndex::SixMonths => 12,
            PlanIndex::TwelveMonths => 15,
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            PlanIndex::ThreeMonths => 3,
            PlanIndex::SixMonths => 6,
            PlanIndex::TwelveMonths => 12,
        }
    }

    /// Label used in the plan selector, e.g. `3 Months (10% APY)`
    pub fn label(&self) -> String {
        format!("{} Months ({}% APY)", self.months(), self.apy_percent())
    }
}

impl TryFrom<u64> for PlanIndex {
    type Error = StakingError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PlanIndex::ThreeMonths),
            1 => Ok(PlanIndex::SixMonths),
            2 => Ok(PlanIndex::TwelveMonths),
            other => Err(StakingError::InvalidPlan(other)),
        }
    }
}

impl Default for PlanIndex {
    fn default() -> Self {
        PlanIndex::ThreeMonths
    }
}

impl fmt::Display for PlanIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_table() {
        assert_eq!(PlanIndex::ThreeMonths.label(), "3 Months (10% APY)");
        assert_eq!(PlanIndex::SixMonths.label(), "6 Months (12% APY)");
        assert_eq!(PlanIndex::TwelveMonths.label(), "12 Months (15% APY)");
        assert_eq!(PlanIndex::SixMonths.lock_days(), 180);
    }

    #[test]
    fn test_try_from() {
        for plan in PlanIndex::ALL {
            assert_eq!(PlanIndex::try_from(plan.index() as u64).unwrap(), plan);
        }
        assert!(matches!(PlanIndex::try_from(3), Err(StakingError::InvalidPlan(3))));
    }
}
