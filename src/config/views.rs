use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::tier::Tier;
use crate::types::CollectionFilter;

/// One staking page: which collection it shows, under which tier, against which contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierView {
    pub collection_address: Address,
    pub tier: Tier,
    pub staking_contract: Address,
}

impl TierView {
    pub fn route(&self) -> String {
        self.tier.route()
    }

    pub fn filter(&self) -> CollectionFilter {
        CollectionFilter::Only(self.collection_address)
    }

    /// Whether a token belongs on this page (right collection and inside the tier's id range)
    pub fn is_eligible(&self, collection: &Address, token_id: u64) -> bool {
        *collection == self.collection_address && self.tier.contains(token_id)
    }
}

pub fn tier_views(collection: Address, staking_contract: Address) -> Vec<TierView> {
    Tier::ALL
        .iter()
        .map(|tier| TierView {
            collection_address: collection,
            tier: *tier,
            staking_contract,
        })
        .collect()
}

pub fn view_for_route(views: &[TierView], route: &str) -> Option<TierView> {
    let tier = Tier::from_route(route)?;
    views.iter().find(|v| v.tier == tier).cloned()
}
