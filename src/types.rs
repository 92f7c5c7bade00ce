// src/types.rs
//! Records observed from the staking contract and the NFT index

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::plan::PlanIndex;

/// A single staked NFT as reported by `getUserFullState`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub collection: Address,
    pub token_id: u64,
    pub plan: PlanIndex,
    /// Unix seconds
    pub lock_end: i64,
    /// Reward token base units (18 decimals) accrued per second
    pub reward_rate_per_second: U256,
    /// Unix seconds
    pub last_claim: i64,
}

/// An unstaked NFT held by the wallet, according to the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAsset {
    pub collection: Address,
    pub token_id: u64,
    pub name: Option<String>,
    pub media_url: Option<String>,
}

impl WalletAsset {
    pub fn new(collection: Address, token_id: u64) -> Self {
        Self {
            collection,
            token_id,
            name: None,
            media_url: None,
        }
    }
}

/// Authoritative pending-reward total and when it was fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSnapshot {
    pub total_pending: U256,
    /// Unix seconds
    pub fetched_at: i64,
}

/// `getUserFullState` before any normalisation. Stakes may be tuple-shaped
/// (JSON arrays) or object-shaped (JSON objects) depending on the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFullState {
    pub stakes: Vec<serde_json::Value>,
    pub total_pending: U256,
}

/// `getUserFullState` after normalisation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFullState {
    pub positions: Vec<Position>,
    pub total_pending: U256,
}

/// Which collections a view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionFilter {
    Any,
    Only(Address),
}

impl CollectionFilter {
    pub fn matches(&self, collection: &Address) -> bool {
        match self {
            CollectionFilter::Any => true,
            CollectionFilter::Only(address) => address == collection,
        }
    }
}

/// Outcome of a confirmed contract write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: String,
}
