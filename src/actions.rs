// src/actions.rs
//! User-facing stake / unstake / claim / approve flows

use alloy_primitives::Address;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::chain::StakingWriter;
use crate::dashboard::{DashboardView, PendingAction, PendingKind};
use crate::error::{Result, StakingError};
use crate::plan::PlanIndex;
use crate::poller::{PollerCommand, PollerHandle};
use crate::tier::Tier;
use crate::types::TxOutcome;

/// What a card's button does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetAction {
    /// Operator approval missing for the collection
    Approve,
    Stake,
    /// Blacklisted: shown, but cannot be staked or approved
    Restricted,
    /// Token's tier has its own page; staking happens there
    Ineligible { tier: Option<Tier> },
    Unstake { enabled: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    /// `approved` is `None` while the approval read has not succeeded yet.
    /// `tier` is the token's own tier; `eligible` whether it matches the page.
    Available {
        blacklisted: bool,
        eligible: bool,
        tier: Option<Tier>,
        approved: Option<bool>,
    },
    Staked { locked: bool },
}

pub fn asset_action(state: AssetState) -> AssetAction {
    match state {
        AssetState::Available { blacklisted: true, .. } => AssetAction::Restricted,
        AssetState::Available {
            eligible: false,
            tier,
            ..
        } => AssetAction::Ineligible { tier },
        AssetState::Available {
            approved: Some(false),
            ..
        } => AssetAction::Approve,
        AssetState::Available { .. } => AssetAction::Stake,
        AssetState::Staked { locked } => AssetAction::Unstake { enabled: !locked },
    }
}

pub struct StakingActions<W: StakingWriter + ?Sized> {
    writer: Arc<W>,
    poller: PollerHandle,
    next_id: AtomicU64,
}

impl<W: StakingWriter + ?Sized> StakingActions<W> {
    pub fn new(writer: Arc<W>, poller: PollerHandle) -> Self {
        Self {
            writer,
            poller,
            next_id: AtomicU64::new(1),
        }
    }

    fn view(&self) -> DashboardView {
        self.poller.view()
    }

    /// Mark the tokens as pending, run the write, then clear the marker either
    /// way. Only a confirmed write triggers a refresh.
    async fn submit<F>(&self, kind: PendingKind, token_ids: Vec<u64>, write: F) -> Result<TxOutcome>
    where
        F: std::future::Future<Output = Result<TxOutcome>>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.poller.send(PollerCommand::BeginPending(PendingAction {
            id,
            kind,
            token_ids,
        }));

        let result = write.await;
        self.poller.send(PollerCommand::EndPending(id));

        match &result {
            Ok(outcome) => {
                log::info!("{:?} confirmed in {}", kind, outcome.tx_hash);
                self.poller.refresh();
            }
            Err(e) => log::error!("{:?} failed: {}", kind, e),
        }
        result
    }

    pub async fn stake(&self, token_ids: &[u64], plan: PlanIndex) -> Result<TxOutcome> {
        if token_ids.is_empty() {
            return Err(StakingError::NothingSelected);
        }
        let view = self.view();
        for token_id in token_ids {
            let card = view
                .available_card(*token_id)
                .ok_or(StakingError::NotAvailable(*token_id))?;
            match card.action {
                AssetAction::Restricted => return Err(StakingError::Blacklisted(*token_id)),
                AssetAction::Ineligible { tier } => {
                    return Err(StakingError::Ineligible {
                        token_id: *token_id,
                        tier: tier.map_or("Unknown", |t| t.name()).to_string(),
                    })
                }
                _ => {}
            }
        }
        if view.approved == Some(false) {
            return Err(StakingError::NotApproved);
        }

        log::info!("Staking {:?} on {}", token_ids, plan.label());
        let collections = vec![view.collection; token_ids.len()];
        self.submit(
            PendingKind::Stake,
            token_ids.to_vec(),
            self.writer.stake(&collections, token_ids, plan),
        )
        .await
    }

    pub async fn unstake(&self, token_ids: &[u64]) -> Result<TxOutcome> {
        if token_ids.is_empty() {
            return Err(StakingError::NothingSelected);
        }
        let view = self.view();
        let mut collections: Vec<Address> = Vec::with_capacity(token_ids.len());
        for token_id in token_ids {
            let card = view
                .staked_card(*token_id)
                .ok_or(StakingError::NotStaked(*token_id))?;
            if card.lock.is_locked {
                return Err(StakingError::Locked {
                    token_id: *token_id,
                    remaining: card.lock.human_readable.clone(),
                });
            }
            collections.push(card.collection);
        }

        self.submit(
            PendingKind::Unstake,
            token_ids.to_vec(),
            self.writer.unstake(&collections, token_ids),
        )
        .await
    }

    /// Claim rewards for every staked position on this page
    pub async fn claim_all(&self) -> Result<TxOutcome> {
        let view = self.view();
        if view.staked.is_empty() {
            return Err(StakingError::NothingToClaim);
        }
        let (collections, token_ids) = view.claim_args();

        self.submit(
            PendingKind::Claim,
            token_ids.clone(),
            self.writer.claim_reward(&collections, &token_ids),
        )
        .await
    }

    /// Approve the staking contract as operator for the page's collection
    pub async fn approve(&self) -> Result<TxOutcome> {
        let view = self.view();
        let token_ids = view.available.iter().map(|c| c.token_id).collect();
        self.submit(
            PendingKind::Approve,
            token_ids,
            self.writer
                .set_approval_for_all(view.collection, view.staking_contract, true),
        )
        .await
    }
}
