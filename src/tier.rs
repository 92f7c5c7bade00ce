// src/tier.rs
//! Canonical token-id → tier table
//!
//! Every tier owns one closed range of token ids. The ranges are contiguous and
//! ascending, so together they partition `[1, 6_000_000]` with no gaps or overlaps.
//! Anything outside that union (including id 0) has no tier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Starter,
    Basic,
    Standard,
    Vip,
    Premium,
    Diamond,
}

/// (tier, first id, last id, display asset)
const TIER_TABLE: [(Tier, u64, u64, &str); 6] = [
    (Tier::Starter, 1, 1_000_000, "starter.gif"),
    (Tier::Basic, 1_000_001, 2_000_000, "basic.gif"),
    (Tier::Standard, 2_000_001, 3_000_000, "standard.gif"),
    (Tier::Vip, 3_000_001, 4_000_000, "vip.gif"),
    (Tier::Premium, 4_000_001, 5_000_000, "premium.gif"),
    (Tier::Diamond, 5_000_001, 6_000_000, "diamond.gif"),
];

/// Lowest id covered by any tier
pub const MIN_TIERED_ID: u64 = TIER_TABLE[0].1;
/// Highest id covered by any tier
pub const MAX_TIERED_ID: u64 = TIER_TABLE[TIER_TABLE.len() - 1].2;

/// Map a token id to its tier, or `None` when the id is outside every range
pub fn classify(token_id: u64) -> Option<Tier> {
    TIER_TABLE
        .iter()
        .find(|(_, lo, hi, _)| token_id >= *lo && token_id <= *hi)
        .map(|(tier, _, _, _)| *tier)
}

impl Tier {
    pub const ALL: [Tier; 6] = [
        Tier::Starter,
        Tier::Basic,
        Tier::Standard,
        Tier::Vip,
        Tier::Premium,
        Tier::Diamond,
    ];

    fn entry(&self) -> &'static (Tier, u64, u64, &'static str) {
        // ALL and TIER_TABLE share the same order
        &TIER_TABLE[*self as usize]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Starter => "Starter",
            Tier::Basic => "Basic",
            Tier::Standard => "Standard",
            Tier::Vip => "VIP",
            Tier::Premium => "Premium",
            Tier::Diamond => "Diamond",
        }
    }

    /// Closed id range `(first, last)`
    pub fn range(&self) -> (u64, u64) {
        let (_, lo, hi, _) = self.entry();
        (*lo, *hi)
    }

    pub fn contains(&self, token_id: u64) -> bool {
        let (lo, hi) = self.range();
        token_id >= lo && token_id <= hi
    }

    /// Artwork shown on the card for this tier
    pub fn asset(&self) -> &'static str {
        self.entry().3
    }

    /// Route the tier's staking view is served under, e.g. `/StarterStake`
    pub fn route(&self) -> String {
        let slug = match self {
            Tier::Vip => "Vip",
            other => other.name(),
        };
        format!("/{}Stake", slug)
    }

    /// Resolve a route parameter (`/VipStake`, `VipStake`, `vip`) to a tier
    pub fn from_route(route: &str) -> Option<Tier> {
        let trimmed = route.trim().trim_start_matches('/');
        let base = trimmed
            .strip_suffix("Stake")
            .or_else(|| trimmed.strip_suffix("stake"))
            .unwrap_or(trimmed);
        Tier::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(base))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::from_route(s).ok_or_else(|| format!("Unknown tier: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(classify(0), None);
        assert_eq!(classify(1), Some(Tier::Starter));
        assert_eq!(classify(1_000_000), Some(Tier::Starter));
        assert_eq!(classify(1_000_001), Some(Tier::Basic));
        assert_eq!(classify(3_000_001), Some(Tier::Vip));
        assert_eq!(classify(6_000_000), Some(Tier::Diamond));
        assert_eq!(classify(6_000_001), None);
        assert_eq!(classify(u64::MAX), None);
    }

    #[test]
    fn test_table_is_contiguous() {
        assert_eq!(MIN_TIERED_ID, 1);
        assert_eq!(MAX_TIERED_ID, 6_000_000);
        for pair in TIER_TABLE.windows(2) {
            assert!(pair[0].1 <= pair[0].2);
            assert_eq!(pair[0].2 + 1, pair[1].1, "gap or overlap after {:?}", pair[0].0);
        }
        for (i, tier) in Tier::ALL.iter().enumerate() {
            assert_eq!(TIER_TABLE[i].0, *tier);
        }
    }

    #[test]
    fn test_routes() {
        assert_eq!(Tier::Starter.route(), "/StarterStake");
        assert_eq!(Tier::Vip.route(), "/VipStake");
        for tier in Tier::ALL {
            assert_eq!(Tier::from_route(&tier.route()), Some(tier));
        }
        assert_eq!("diamond".parse::<Tier>(), Ok(Tier::Diamond));
        assert_eq!(Tier::from_route("/GoldStake"), None);
    }

    proptest! {
        #[test]
        fn every_supported_id_has_exactly_one_tier(id in MIN_TIERED_ID..=MAX_TIERED_ID) {
            let matches = Tier::ALL.iter().filter(|t| t.contains(id)).count();
            prop_assert_eq!(matches, 1);
            let tier = classify(id).unwrap();
            prop_assert!(tier.contains(id));
        }

        #[test]
        fn ids_above_the_table_are_unknown(id in (MAX_TIERED_ID + 1)..u64::MAX) {
            prop_assert_eq!(classify(id), None);
        }
    }
}
