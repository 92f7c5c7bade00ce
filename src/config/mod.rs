pub mod views;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, StakingError};
use crate::index::media::DEFAULT_IPFS_GATEWAY;

pub use views::TierView;

pub const DEFAULT_RPC_URL: &str = "https://polygon-rpc.com";
pub const DEFAULT_STAKING_CONTRACT: &str = "0x0901d6c6c2a7e42cfe9319f7d76d073499d402ab";
pub const DEFAULT_NFT_COLLECTION: &str = "0x106fb804D03D4EA95CaeFA45C3215b57D8E6835D";
pub const DEFAULT_INDEX_URL: &str = "https://polygon-mainnet.g.alchemy.com/v2";

/// Everything the dashboard core needs to reach the outside world.
/// Built once and handed to the clients, so tests can swap any of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Ethereum JSON-RPC endpoint
    pub rpc_url: String,
    pub staking_contract: Address,
    pub nft_collection: Address,
    /// Account used for `eth_sendTransaction`; reads work without it
    pub sender: Option<Address>,
    /// NFT index base URL (the API key is appended as a path segment)
    pub index_url: String,
    pub index_api_key: String,
    pub ipfs_gateway: String,
    pub chain_poll_secs: u64,
    pub index_poll_secs: u64,
    pub receipt_poll_ms: u64,
    pub receipt_max_attempts: u32,
    /// Symbol shown next to the reward balance
    pub reward_symbol: String,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            staking_contract: Address::from_str(DEFAULT_STAKING_CONTRACT).unwrap_or(Address::ZERO),
            nft_collection: Address::from_str(DEFAULT_NFT_COLLECTION).unwrap_or(Address::ZERO),
            sender: None,
            index_url: DEFAULT_INDEX_URL.to_string(),
            index_api_key: String::new(),
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            chain_poll_secs: 15,
            index_poll_secs: 60,
            receipt_poll_ms: 2_000,
            receipt_max_attempts: 90,
            reward_symbol: "GKY".to_string(),
        }
    }
}

fn env_address(key: &str) -> Result<Option<Address>> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Address::from_str(v.trim())
            .map(Some)
            .map_err(|e| StakingError::Config(format!("{} is not an address: {}", key, e))),
        _ => Ok(None),
    }
}

fn env_number<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl StakingConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            rpc_url: std::env::var("STAKING_RPC_URL").unwrap_or(defaults.rpc_url),
            staking_contract: env_address("STAKING_CONTRACT")?.unwrap_or(defaults.staking_contract),
            nft_collection: env_address("NFT_COLLECTION")?.unwrap_or(defaults.nft_collection),
            sender: env_address("STAKING_SENDER")?,
            index_url: std::env::var("NFT_INDEX_URL").unwrap_or(defaults.index_url),
            index_api_key: std::env::var("NFT_INDEX_API_KEY").unwrap_or_default(),
            ipfs_gateway: std::env::var("IPFS_GATEWAY").unwrap_or(defaults.ipfs_gateway),
            chain_poll_secs: env_number("CHAIN_POLL_SECS", defaults.chain_poll_secs),
            index_poll_secs: env_number("INDEX_POLL_SECS", defaults.index_poll_secs),
            receipt_poll_ms: env_number("RECEIPT_POLL_MS", defaults.receipt_poll_ms),
            receipt_max_attempts: env_number("RECEIPT_MAX_ATTEMPTS", defaults.receipt_max_attempts),
            reward_symbol: std::env::var("REWARD_SYMBOL").unwrap_or(defaults.reward_symbol),
        })
    }

    /// Check that the config can actually drive a dashboard
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(StakingError::Config("rpc_url is empty".to_string()));
        }
        if self.staking_contract == Address::ZERO {
            return Err(StakingError::Config("staking_contract is not set".to_string()));
        }
        if self.nft_collection == Address::ZERO {
            return Err(StakingError::Config("nft_collection is not set".to_string()));
        }
        if self.chain_poll_secs == 0 || self.index_poll_secs == 0 {
            return Err(StakingError::Config("poll intervals must be at least 1 second".to_string()));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// The six tier views, all backed by this config's collection and contract
    pub fn tier_views(&self) -> Vec<TierView> {
        views::tier_views(self.nft_collection, self.staking_contract)
    }

    /// View for a route parameter such as `/PremiumStake`
    pub fn view_for_route(&self, route: &str) -> Option<TierView> {
        views::view_for_route(&self.tier_views(), route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StakingConfig::default();
        assert!(config.is_valid());
        assert_eq!(config.tier_views().len(), 6);
    }

    #[test]
    fn test_validate_rejects_missing_contract() {
        let config = StakingConfig {
            staking_contract: Address::ZERO,
            ..StakingConfig::default()
        };
        assert!(matches!(config.validate(), Err(StakingError::Config(_))));

        let config = StakingConfig {
            chain_poll_secs: 0,
            ..StakingConfig::default()
        };
        assert!(!config.is_valid());
    }

    #[test]
    fn test_view_for_route() {
        let config = StakingConfig::default();
        let view = config.view_for_route("/VipStake").unwrap();
        assert_eq!(view.tier.name(), "VIP");
        assert_eq!(view.collection_address, config.nft_collection);
        assert!(config.view_for_route("/Nope").is_none());
    }
}
