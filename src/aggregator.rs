// src/aggregator.rs
//! Merge the chain read and the wallet index into one consistent view
//!
//! The two sources are polled independently and can disagree for a while, e.g.
//! an NFT that was just staked may still be reported by the index as held in
//! the wallet. The chain read is authoritative: anything it reports as staked
//! never shows up as available.

use alloy_primitives::{Address, U256};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;

use crate::error::{Result, StakingError};
use crate::plan::PlanIndex;
use crate::types::{CollectionFilter, Position, RawFullState, UserFullState, WalletAsset};
use crate::units::{parse_u256, u256_to_u64};

/// A record that could not be used, kept for troubleshooting only
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub source: &'static str,
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    pub staked: Vec<Position>,
    pub available: Vec<WalletAsset>,
}

impl Reconciled {
    pub fn total_rate(&self) -> U256 {
        self.staked
            .iter()
            .fold(U256::ZERO, |acc, p| acc.saturating_add(p.reward_rate_per_second))
    }

    pub fn rates(&self) -> impl Iterator<Item = U256> + '_ {
        self.staked.iter().map(|p| p.reward_rate_per_second)
    }
}

/// Tuple layout of a stake record: collection, tokenId, planIndex, lockEndTime, rewardRate, lastClaimTime
const TUPLE_FIELDS: usize = 6;

fn field<'a>(stake: &'a Value, keys: &[&str], tuple_index: usize) -> Option<&'a Value> {
    match stake {
        Value::Object(map) => keys.iter().find_map(|k| map.get(*k)),
        Value::Array(items) => items.get(tuple_index),
        _ => None,
    }
}

fn value_to_u256(value: &Value) -> Result<U256> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| StakingError::Decode(format!("Not an unsigned integer: {}", n))),
        Value::String(s) => parse_u256(s),
        // ethers-style BigNumber objects: { "type": "BigNumber", "hex": "0x.." }
        Value::Object(map) => match map.get("hex").and_then(Value::as_str) {
            Some(hex) => parse_u256(hex),
            None => Err(StakingError::Decode(format!("Unexpected number object: {}", value))),
        },
        other => Err(StakingError::Decode(format!("Unexpected number value: {}", other))),
    }
}

fn value_to_i64(value: &Value) -> Result<i64> {
    let n = u256_to_u64(value_to_u256(value)?)?;
    i64::try_from(n).map_err(|_| StakingError::Decode(format!("Timestamp out of range: {}", n)))
}

fn value_to_address(value: &Value) -> Result<Address> {
    let s = value
        .as_str()
        .ok_or_else(|| StakingError::InvalidAddress(value.to_string()))?;
    let s = s.trim();
    // A 32-byte ABI word holding a left-padded address
    if s.len() == 66 && s.starts_with("0x") {
        let bytes = hex::decode(&s[2..]).map_err(|e| StakingError::InvalidAddress(e.to_string()))?;
        if bytes[..12].iter().any(|b| *b != 0) {
            return Err(StakingError::InvalidAddress(s.to_string()));
        }
        return Ok(Address::from_slice(&bytes[12..]));
    }
    Address::from_str(s).map_err(|e| StakingError::InvalidAddress(format!("{}: {}", s, e)))
}

fn required<'a>(stake: &'a Value, keys: &[&str], tuple_index: usize) -> Result<&'a Value> {
    field(stake, keys, tuple_index)
        .ok_or_else(|| StakingError::Decode(format!("Missing field {}", keys[0])))
}

/// Normalise one raw stake record, tuple- or object-shaped
pub fn normalize_position(stake: &Value) -> Result<Position> {
    if let Value::Array(items) = stake {
        if items.len() < TUPLE_FIELDS {
            return Err(StakingError::Decode(format!(
                "Stake tuple has {} fields, expected {}",
                items.len(),
                TUPLE_FIELDS
            )));
        }
    } else if !stake.is_object() {
        return Err(StakingError::Decode(format!("Unexpected stake shape: {}", stake)));
    }

    let collection = value_to_address(required(stake, &["collection", "collectionAddress"], 0)?)?;
    let token_id = u256_to_u64(value_to_u256(required(stake, &["tokenId", "tokenIds"], 1)?)?)?;
    let plan_raw = match field(stake, &["planIndex", "plan"], 2) {
        Some(v) => u256_to_u64(value_to_u256(v)?)?,
        None => 0,
    };
    let plan = PlanIndex::try_from(plan_raw)?;
    let lock_end = value_to_i64(required(stake, &["lockEndTime", "lockEndTimestamp"], 3)?)?;
    let reward_rate_per_second =
        value_to_u256(required(stake, &["rewardRate", "rewardRatePerSecond"], 4)?)?;
    let last_claim = match field(stake, &["lastClaimTime", "lastClaimTimestamp"], 5) {
        Some(v) => value_to_i64(v)?,
        None => 0,
    };

    Ok(Position {
        collection,
        token_id,
        plan,
        lock_end,
        reward_rate_per_second,
        last_claim,
    })
}

/// Normalise every stake in a raw read. Records that fail are dropped and
/// reported as diagnostics; the rest of the read is still used.
pub fn normalize_positions(raw: &RawFullState) -> (UserFullState, Vec<Diagnostic>) {
    let mut positions = Vec::with_capacity(raw.stakes.len());
    let mut diagnostics = Vec::new();

    for (index, stake) in raw.stakes.iter().enumerate() {
        match normalize_position(stake) {
            Ok(position) => positions.push(position),
            Err(e) => {
                log::warn!("Skipping stake record #{}: {}", index, e);
                diagnostics.push(Diagnostic {
                    source: "getUserFullState",
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    (
        UserFullState {
            positions,
            total_pending: raw.total_pending,
        },
        diagnostics,
    )
}

/// Split chain and wallet data into disjoint staked / available lists
pub fn reconcile(
    chain_state: &[Position],
    wallet_assets: &[WalletAsset],
    filter: CollectionFilter,
) -> Reconciled {
    let staked: Vec<Position> = chain_state
        .iter()
        .filter(|p| filter.matches(&p.collection))
        .cloned()
        .collect();

    let staked_keys: HashSet<(Address, u64)> =
        staked.iter().map(|p| (p.collection, p.token_id)).collect();

    let mut seen = HashSet::new();
    let available = wallet_assets
        .iter()
        .filter(|a| filter.matches(&a.collection))
        .filter(|a| !staked_keys.contains(&(a.collection, a.token_id)))
        .filter(|a| seen.insert((a.collection, a.token_id)))
        .cloned()
        .collect();

    Reconciled { staked, available }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const COLLECTION_A: &str = "0x106fb804D03D4EA95CaeFA45C3215b57D8E6835D";
    const COLLECTION_B: &str = "0x0901d6c6c2a7e42cfe9319f7d76d073499d402ab";

    fn addr(s: &str) -> Address {
        Address::from_str(s).unwrap()
    }

    fn position(collection: Address, token_id: u64, rate: u64) -> Position {
        Position {
            collection,
            token_id,
            plan: PlanIndex::ThreeMonths,
            lock_end: 0,
            reward_rate_per_second: U256::from(rate),
            last_claim: 0,
        }
    }

    #[test]
    fn test_reconcile_scenario() {
        let a = addr(COLLECTION_A);
        let chain = vec![position(a, 5, 100)];
        let wallet = vec![WalletAsset::new(a, 5), WalletAsset::new(a, 9)];

        let view = reconcile(&chain, &wallet, CollectionFilter::Only(a));
        assert_eq!(view.staked.iter().map(|p| p.token_id).collect::<Vec<_>>(), vec![5]);
        assert_eq!(view.available.iter().map(|a| a.token_id).collect::<Vec<_>>(), vec![9]);
        assert_eq!(view.total_rate(), U256::from(100u64));
    }

    #[test]
    fn test_reconcile_filters_collection() {
        let a = addr(COLLECTION_A);
        let b = addr(COLLECTION_B);
        let chain = vec![position(a, 1, 10), position(b, 2, 20)];
        let wallet = vec![WalletAsset::new(b, 3), WalletAsset::new(a, 4), WalletAsset::new(a, 4)];

        let only_a = reconcile(&chain, &wallet, CollectionFilter::Only(a));
        assert_eq!(only_a.staked.len(), 1);
        assert_eq!(only_a.available, vec![WalletAsset::new(a, 4)]);

        let any = reconcile(&chain, &wallet, CollectionFilter::Any);
        assert_eq!(any.staked.len(), 2);
        assert_eq!(any.available.len(), 2);
    }

    #[test]
    fn test_same_token_id_in_other_collection_is_not_deduplicated() {
        let a = addr(COLLECTION_A);
        let b = addr(COLLECTION_B);
        let view = reconcile(&[position(a, 7, 1)], &[WalletAsset::new(b, 7)], CollectionFilter::Any);
        assert_eq!(view.available, vec![WalletAsset::new(b, 7)]);
    }

    #[test]
    fn test_normalize_object_and_tuple_shapes() {
        let object = json!({
            "collection": COLLECTION_A.to_lowercase(),
            "tokenId": { "type": "BigNumber", "hex": "0x05" },
            "planIndex": 1,
            "lockEndTime": "1700000000",
            "rewardRate": "0x64",
            "lastClaimTime": 1690000000u64
        });
        let tuple = json!([
            "0x000000000000000000000000106fb804d03d4ea95cafea45c3215b57d8e6835d",
            "0x0000000000000000000000000000000000000000000000000000000000000005",
            "0x01",
            "0x6553f100",
            "100",
            "1690000000"
        ]);

        let from_object = normalize_position(&object).unwrap();
        let from_tuple = normalize_position(&tuple).unwrap();
        assert_eq!(from_object, from_tuple);
        assert_eq!(from_object.collection, addr(COLLECTION_A));
        assert_eq!(from_object.token_id, 5);
        assert_eq!(from_object.plan, PlanIndex::SixMonths);
        assert_eq!(from_object.lock_end, 1_700_000_000);
        assert_eq!(from_object.reward_rate_per_second, U256::from(100u64));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let raw = RawFullState {
            stakes: vec![
                json!({ "collection": COLLECTION_A, "tokenId": 1, "lockEndTime": 10, "rewardRate": 5 }),
                json!({ "collection": "not-an-address", "tokenId": 2, "lockEndTime": 10, "rewardRate": 5 }),
                json!(["0x01"]),
                json!("garbage"),
                json!({ "collection": COLLECTION_A, "tokenId": 3, "planIndex": 7, "lockEndTime": 10, "rewardRate": 5 }),
            ],
            total_pending: U256::from(42u64),
        };

        let (state, diagnostics) = normalize_positions(&raw);
        assert_eq!(state.positions.len(), 1);
        assert_eq!(state.positions[0].token_id, 1);
        assert_eq!(state.positions[0].plan, PlanIndex::ThreeMonths);
        assert_eq!(state.total_pending, U256::from(42u64));
        assert_eq!(diagnostics.iter().map(|d| d.index).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    proptest! {
        #[test]
        fn staked_and_available_never_overlap(
            staked_ids in proptest::collection::vec(0u64..50, 0..20),
            wallet_ids in proptest::collection::vec(0u64..50, 0..40),
        ) {
            let a = addr(COLLECTION_A);
            let chain: Vec<Position> = staked_ids.iter().map(|id| position(a, *id, 1)).collect();
            let wallet: Vec<WalletAsset> = wallet_ids.iter().map(|id| WalletAsset::new(a, *id)).collect();

            let view = reconcile(&chain, &wallet, CollectionFilter::Only(a));
            for asset in &view.available {
                prop_assert!(!view.staked.iter().any(|p| p.token_id == asset.token_id));
            }
            for id in &wallet_ids {
                let listed = view.staked.iter().any(|p| p.token_id == *id)
                    || view.available.iter().any(|x| x.token_id == *id);
                prop_assert!(listed);
            }
        }
    }
}
