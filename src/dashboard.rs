// src/dashboard.rs
//! View state of one tier page for one wallet
//!
//! The dashboard is owned by the poller and mutated only from there, so chain
//! snapshots, index results, ticks and action markers are applied one at a time.
//! Every fetch is tagged with the generation it was started under and a
//! sequence number; results from an older wallet or older than what is already
//! applied are dropped.

use alloy_primitives::Address;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

use crate::accrual::RewardAccrualEngine;
use crate::actions::{asset_action, AssetAction, AssetState};
use crate::aggregator::{normalize_positions, reconcile, Diagnostic, Reconciled};
use crate::config::TierView;
use crate::error::Result;
use crate::lock::{evaluate, LockStatus};
use crate::plan::PlanIndex;
use crate::tier::{classify, Tier};
use crate::types::{Position, RawFullState, RewardSnapshot, WalletAsset};
use crate::units::{format_units, DISPLAY_DECIMALS, REWARD_DECIMALS};

/// Only the most recent diagnostics are kept
pub const MAX_DIAGNOSTICS: usize = 32;

/// Result of one chain poll
#[derive(Debug, Clone)]
pub struct ChainFetch {
    pub raw: RawFullState,
    /// `isApprovedForAll(owner, staking_contract)`; `None` when that read failed
    pub approved: Option<bool>,
    /// Unix seconds at which the read resolved
    pub fetched_at: i64,
}

/// Result of one index poll
#[derive(Debug, Clone, Default)]
pub struct IndexFetch {
    pub assets: Vec<WalletAsset>,
    /// Token ids the staking contract refuses
    pub blacklisted: HashSet<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PendingKind {
    Approve,
    Stake,
    Unstake,
    Claim,
}

/// A write that has been submitted but not confirmed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAction {
    pub id: u64,
    pub kind: PendingKind,
    pub token_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StakedCard {
    pub collection: Address,
    pub token_id: u64,
    pub tier: Option<Tier>,
    pub plan: PlanIndex,
    pub plan_label: String,
    pub lock: LockStatus,
    /// Reward tokens per second, e.g. `0.000003`
    pub reward_rate: String,
    pub action: AssetAction,
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableCard {
    pub collection: Address,
    pub token_id: u64,
    pub tier: Option<Tier>,
    pub name: Option<String>,
    pub media_url: Option<String>,
    pub action: AssetAction,
    pub pending: bool,
}

/// Render-ready snapshot of the whole page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardView {
    pub owner: Option<Address>,
    pub generation: u64,
    pub tier: Tier,
    pub route: String,
    pub collection: Address,
    pub staking_contract: Address,
    /// False until the first chain read for this wallet has been applied
    pub has_snapshot: bool,
    /// False until the first index read for this wallet has been applied
    pub has_wallet_assets: bool,
    pub pending_rewards: String,
    pub reward_symbol: String,
    /// Summed per-second rate of every staked position, e.g. `0.0002`
    pub total_reward_rate: String,
    pub staked: Vec<StakedCard>,
    pub available: Vec<AvailableCard>,
    pub active_count: usize,
    pub approved: Option<bool>,
    pub pending: Vec<PendingAction>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DashboardView {
    pub fn staked_card(&self, token_id: u64) -> Option<&StakedCard> {
        self.staked.iter().find(|c| c.token_id == token_id)
    }

    pub fn available_card(&self, token_id: u64) -> Option<&AvailableCard> {
        self.available.iter().find(|c| c.token_id == token_id)
    }

    /// `(collections, token_ids)` for a claim covering every staked position
    pub fn claim_args(&self) -> (Vec<Address>, Vec<u64>) {
        self.staked.iter().map(|c| (c.collection, c.token_id)).unzip()
    }
}

pub struct Dashboard {
    view: TierView,
    reward_symbol: String,
    owner: Option<Address>,
    generation: u64,
    last_chain_seq: Option<u64>,
    last_index_seq: Option<u64>,
    engine: RewardAccrualEngine,
    positions: Vec<Position>,
    wallet_assets: Vec<WalletAsset>,
    reconciled: Reconciled,
    diagnostics: VecDeque<Diagnostic>,
    pending: Vec<PendingAction>,
    blacklisted: HashSet<u64>,
    approved: Option<bool>,
}

impl Dashboard {
    pub fn new(view: TierView, reward_symbol: &str) -> Self {
        Self {
            view,
            reward_symbol: reward_symbol.to_string(),
            owner: None,
            generation: 0,
            last_chain_seq: None,
            last_index_seq: None,
            engine: RewardAccrualEngine::new(),
            positions: Vec::new(),
            wallet_assets: Vec::new(),
            reconciled: Reconciled::default(),
            diagnostics: VecDeque::with_capacity(MAX_DIAGNOSTICS),
            pending: Vec::new(),
            blacklisted: HashSet::new(),
            approved: None,
        }
    }

    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tier_view(&self) -> &TierView {
        &self.view
    }

    pub fn engine(&self) -> &RewardAccrualEngine {
        &self.engine
    }

    /// True while at least one staked position is accruing
    pub fn has_active_positions(&self) -> bool {
        !self.reconciled.staked.is_empty()
    }

    /// Start over for another wallet. Returns the new generation.
    pub fn switch_owner(&mut self, owner: Address) -> u64 {
        self.generation += 1;
        self.owner = Some(owner);
        self.last_chain_seq = None;
        self.last_index_seq = None;
        self.engine.reset();
        self.positions.clear();
        self.wallet_assets.clear();
        self.reconciled = Reconciled::default();
        self.diagnostics.clear();
        self.pending.clear();
        self.blacklisted.clear();
        self.approved = None;
        log::info!("Dashboard now tracking {} (generation {})", owner, self.generation);
        self.generation
    }

    fn is_stale(&self, generation: u64, seq: u64, last: Option<u64>) -> bool {
        generation != self.generation || last.map_or(false, |l| seq <= l)
    }

    /// Apply a chain poll. Returns whether it changed anything.
    pub fn apply_chain(&mut self, generation: u64, seq: u64, result: Result<ChainFetch>) -> bool {
        if self.is_stale(generation, seq, self.last_chain_seq) {
            log::debug!("Ignoring stale chain result (generation {}, seq {})", generation, seq);
            return false;
        }

        let fetch = match result {
            Ok(fetch) => fetch,
            Err(e) => {
                log::warn!("Chain read failed, keeping last known state: {}", e);
                return false;
            }
        };
        self.last_chain_seq = Some(seq);

        let (state, diagnostics) = normalize_positions(&fetch.raw);
        for diagnostic in diagnostics {
            self.push_diagnostic(diagnostic);
        }

        self.engine.on_snapshot(RewardSnapshot {
            total_pending: state.total_pending,
            fetched_at: fetch.fetched_at,
        });
        self.positions = state.positions;
        if fetch.approved.is_some() {
            self.approved = fetch.approved;
        }
        self.reconcile();
        true
    }

    /// Apply an index poll. Returns whether it changed anything.
    pub fn apply_index(&mut self, generation: u64, seq: u64, result: Result<IndexFetch>) -> bool {
        if self.is_stale(generation, seq, self.last_index_seq) {
            log::debug!("Ignoring stale index result (generation {}, seq {})", generation, seq);
            return false;
        }

        let fetch = match result {
            Ok(fetch) => fetch,
            Err(e) => {
                log::warn!("NFT index read failed, keeping last known assets: {}", e);
                return false;
            }
        };
        self.last_index_seq = Some(seq);
        self.wallet_assets = fetch.assets;
        self.blacklisted = fetch.blacklisted;
        self.reconcile();
        true
    }

    fn reconcile(&mut self) {
        self.reconciled = reconcile(&self.positions, &self.wallet_assets, self.view.filter());
    }

    fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(diagnostic);
    }

    /// One local recomputation of the reward estimate
    pub fn tick(&mut self, now: i64) {
        self.engine.on_tick(now, self.reconciled.rates());
    }

    pub fn begin_pending(&mut self, action: PendingAction) {
        self.pending.retain(|p| p.id != action.id);
        self.pending.push(action);
    }

    pub fn end_pending(&mut self, id: u64) {
        self.pending.retain(|p| p.id != id);
    }

    fn is_pending(&self, token_id: u64) -> bool {
        self.pending.iter().any(|p| p.token_ids.contains(&token_id))
    }

    pub fn view(&self, now: i64) -> DashboardView {
        let staked = self
            .reconciled
            .staked
            .iter()
            .map(|p| {
                let lock = evaluate(p.lock_end, now);
                let action = asset_action(AssetState::Staked {
                    locked: lock.is_locked,
                });
                StakedCard {
                    collection: p.collection,
                    token_id: p.token_id,
                    tier: classify(p.token_id),
                    plan: p.plan,
                    plan_label: p.plan.label(),
                    lock,
                    reward_rate: format_units(p.reward_rate_per_second, REWARD_DECIMALS),
                    action,
                    pending: self.is_pending(p.token_id),
                }
            })
            .collect::<Vec<_>>();

        let available = self
            .reconciled
            .available
            .iter()
            .map(|a| AvailableCard {
                collection: a.collection,
                token_id: a.token_id,
                tier: classify(a.token_id),
                name: a.name.clone(),
                media_url: a.media_url.clone(),
                action: asset_action(AssetState::Available {
                    blacklisted: self.blacklisted.contains(&a.token_id),
                    eligible: self.view.is_eligible(&a.collection, a.token_id),
                    tier: classify(a.token_id),
                    approved: self.approved,
                }),
                pending: self.is_pending(a.token_id),
            })
            .collect();

        DashboardView {
            owner: self.owner,
            generation: self.generation,
            tier: self.view.tier,
            route: self.view.route(),
            collection: self.view.collection_address,
            staking_contract: self.view.staking_contract,
            has_snapshot: self.engine.is_ticking(),
            has_wallet_assets: self.last_index_seq.is_some(),
            pending_rewards: self.engine.render(DISPLAY_DECIMALS),
            reward_symbol: self.reward_symbol.clone(),
            total_reward_rate: format_units(self.reconciled.total_rate(), REWARD_DECIMALS),
            active_count: staked.len(),
            staked,
            available,
            approved: self.approved,
            pending: self.pending.clone(),
            diagnostics: self.diagnostics.iter().cloned().collect(),
        }
    }
}
