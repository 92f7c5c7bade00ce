// src/chain/mod.rs
//! Staking contract access over Ethereum JSON-RPC

pub mod abi;
mod client;

pub use client::RpcStakingClient;

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::error::Result;
use crate::plan::PlanIndex;
use crate::types::{RawFullState, TxOutcome};

/// Read side of the staking and NFT contracts
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// All stakes of `owner` plus the contract's pending reward total
    async fn get_user_full_state(&self, owner: Address) -> Result<RawFullState>;

    async fn is_blacklisted(&self, collection: Address, token_id: u64) -> Result<bool>;

    /// ERC-721 operator approval on `collection`
    async fn is_approved_for_all(
        &self,
        collection: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool>;
}

/// Write side. Implementations return only once the transaction is mined;
/// a reverted transaction is an error.
#[async_trait]
pub trait StakingWriter: Send + Sync {
    async fn stake(
        &self,
        collections: &[Address],
        token_ids: &[u64],
        plan: PlanIndex,
    ) -> Result<TxOutcome>;

    async fn unstake(&self, collections: &[Address], token_ids: &[u64]) -> Result<TxOutcome>;

    async fn claim_reward(&self, collections: &[Address], token_ids: &[u64]) -> Result<TxOutcome>;

    async fn set_approval_for_all(
        &self,
        collection: Address,
        operator: Address,
        approved: bool,
    ) -> Result<TxOutcome>;
}
