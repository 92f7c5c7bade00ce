// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StakingError>;

#[derive(Debug, Error)]
pub enum StakingError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid plan index: {0}")]
    InvalidPlan(u64),
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
    #[error("Token #{0} is blacklisted")]
    Blacklisted(u64),
    #[error("Token #{token_id} is locked for another {remaining}")]
    Locked { token_id: u64, remaining: String },
    #[error("Staking contract is not approved for this collection")]
    NotApproved,
    #[error("No staked positions to claim from")]
    NothingToClaim,
    #[error("No tokens selected")]
    NothingSelected,
    #[error("Token #{0} is not staked by this wallet")]
    NotStaked(u64),
    #[error("Token #{0} is not available to stake from this wallet")]
    NotAvailable(u64),
    #[error("Token #{token_id} belongs on the {tier} page")]
    Ineligible { token_id: u64, tier: String },
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for StakingError {
    fn from(e: serde_json::Error) -> Self {
        StakingError::Decode(e.to_string())
    }
}
