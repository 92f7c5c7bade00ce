//! Staking dashboard core for a tiered NFT collection
//!
//! Reads positions and pending rewards from the staking contract, reads wallet
//! holdings from an NFT index, and keeps a live, ticking view of both.

pub mod accrual;
pub mod actions;
pub mod aggregator;
pub mod chain;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod index;
pub mod lock;
pub mod plan;
pub mod poller;
pub mod tier;
pub mod types;
pub mod units;

pub use actions::{AssetAction, StakingActions};
pub use chain::{ChainReader, RpcStakingClient, StakingWriter};
pub use config::{StakingConfig, TierView};
pub use dashboard::{Dashboard, DashboardView};
pub use error::{Result, StakingError};
pub use index::{AlchemyIndexClient, NftIndex};
pub use poller::{Poller, PollerHandle, PollerSettings};
