// src/index/mod.rs
//! NFT ownership index integration

mod client;
pub mod media;
mod types;

pub use client::AlchemyIndexClient;
pub use types::*;

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::error::Result;
use crate::types::WalletAsset;

/// Off-chain view of which NFTs a wallet holds
#[async_trait]
pub trait NftIndex: Send + Sync {
    async fn owned_tokens(&self, owner: Address, collection: Address) -> Result<Vec<WalletAsset>>;
}
