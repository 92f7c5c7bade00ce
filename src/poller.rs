// src/poller.rs
//! Background loop that keeps one dashboard fresh
//!
//! A single task owns the `Dashboard`. Chain and index reads run as spawned
//! fetches in a `JoinSet`; their results come back into the loop and are applied
//! one at a time, tagged with the generation and sequence number they were
//! started under. The 1 Hz tick only exists while something is staked.

use alloy_primitives::Address;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::chain::ChainReader;
use crate::config::{StakingConfig, TierView};
use crate::dashboard::{ChainFetch, Dashboard, DashboardView, IndexFetch, PendingAction};
use crate::error::Result;
use crate::index::NftIndex;
use crate::lock::now_unix;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub enum PollerCommand {
    SwitchOwner(Address),
    RefreshChain,
    RefreshIndex,
    BeginPending(PendingAction),
    EndPending(u64),
    Shutdown,
}

/// Cloneable handle for talking to a running poller
#[derive(Clone)]
pub struct PollerHandle {
    commands: mpsc::UnboundedSender<PollerCommand>,
    views: watch::Receiver<DashboardView>,
}

impl PollerHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<PollerCommand>,
        views: watch::Receiver<DashboardView>,
    ) -> Self {
        Self { commands, views }
    }

    pub fn send(&self, command: PollerCommand) {
        if self.commands.send(command).is_err() {
            log::warn!("Poller is no longer running; command dropped");
        }
    }

    pub fn switch_owner(&self, owner: Address) {
        self.send(PollerCommand::SwitchOwner(owner));
    }

    pub fn refresh(&self) {
        self.send(PollerCommand::RefreshChain);
        self.send(PollerCommand::RefreshIndex);
    }

    pub fn shutdown(&self) {
        self.send(PollerCommand::Shutdown);
    }

    /// Latest published view
    pub fn view(&self) -> DashboardView {
        self.views.borrow().clone()
    }

    /// A fresh receiver for render loops
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.views.clone()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    pub chain_every: Duration,
    pub index_every: Duration,
    pub tick_every: Duration,
}

impl PollerSettings {
    pub fn from_config(config: &StakingConfig) -> Self {
        Self {
            chain_every: Duration::from_secs(config.chain_poll_secs.max(1)),
            index_every: Duration::from_secs(config.index_poll_secs.max(1)),
            tick_every: TICK_INTERVAL,
        }
    }
}

enum Fetched {
    Chain {
        generation: u64,
        seq: u64,
        result: Result<ChainFetch>,
    },
    Index {
        generation: u64,
        seq: u64,
        result: Result<IndexFetch>,
    },
}

pub struct Poller {
    reader: Arc<dyn ChainReader>,
    index: Arc<dyn NftIndex>,
    dashboard: Dashboard,
    settings: PollerSettings,
    fetches: JoinSet<Fetched>,
    next_seq: u64,
}

async fn read_chain(
    reader: Arc<dyn ChainReader>,
    owner: Address,
    view: TierView,
) -> Result<ChainFetch> {
    let raw = reader.get_user_full_state(owner).await?;
    let approved = match reader
        .is_approved_for_all(view.collection_address, owner, view.staking_contract)
        .await
    {
        Ok(approved) => Some(approved),
        Err(e) => {
            log::warn!("Approval check failed for {}: {}", owner, e);
            None
        }
    };
    Ok(ChainFetch {
        raw,
        approved,
        fetched_at: now_unix(),
    })
}

async fn read_index(
    reader: Arc<dyn ChainReader>,
    index: Arc<dyn NftIndex>,
    owner: Address,
    view: TierView,
) -> Result<IndexFetch> {
    let assets = index.owned_tokens(owner, view.collection_address).await?;

    let mut checks = JoinSet::new();
    for asset in &assets {
        let reader = reader.clone();
        let (collection, token_id) = (asset.collection, asset.token_id);
        checks.spawn(async move {
            let listed = reader.is_blacklisted(collection, token_id).await;
            (token_id, listed)
        });
    }

    let mut blacklisted = HashSet::new();
    while let Some(joined) = checks.join_next().await {
        match joined {
            Ok((token_id, Ok(true))) => {
                blacklisted.insert(token_id);
            }
            Ok((_, Ok(false))) => {}
            Ok((token_id, Err(e))) => {
                log::warn!("Blacklist check failed for #{}: {}", token_id, e)
            }
            Err(e) => log::warn!("Blacklist check task failed: {}", e),
        }
    }
    Ok(IndexFetch {
        assets,
        blacklisted,
    })
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn poll_interval(period: Duration) -> Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

impl Poller {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        index: Arc<dyn NftIndex>,
        dashboard: Dashboard,
        settings: PollerSettings,
    ) -> Self {
        Self {
            reader,
            index,
            dashboard,
            settings,
            fetches: JoinSet::new(),
            next_seq: 0,
        }
    }

    /// Start the loop on the current runtime
    pub fn spawn(self) -> (PollerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(self.dashboard.view(now_unix()));
        let task = tokio::spawn(self.run(command_rx, view_tx));
        (PollerHandle::new(command_tx, view_rx), task)
    }

    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn spawn_chain_fetch(&mut self) {
        let Some(owner) = self.dashboard.owner() else {
            return;
        };
        let generation = self.dashboard.generation();
        let seq = self.seq();
        let reader = self.reader.clone();
        let view = self.dashboard.tier_view().clone();
        self.fetches.spawn(async move {
            Fetched::Chain {
                generation,
                seq,
                result: read_chain(reader, owner, view).await,
            }
        });
    }

    fn spawn_index_fetch(&mut self) {
        let Some(owner) = self.dashboard.owner() else {
            return;
        };
        let generation = self.dashboard.generation();
        let seq = self.seq();
        let reader = self.reader.clone();
        let index = self.index.clone();
        let view = self.dashboard.tier_view().clone();
        self.fetches.spawn(async move {
            Fetched::Index {
                generation,
                seq,
                result: read_index(reader, index, owner, view).await,
            }
        });
    }

    /// Returns false once the loop should stop
    fn handle_command(&mut self, command: Option<PollerCommand>) -> bool {
        match command {
            None | Some(PollerCommand::Shutdown) => return false,
            Some(PollerCommand::SwitchOwner(owner)) => {
                // Anything in flight belongs to the previous wallet
                self.fetches.abort_all();
                self.dashboard.switch_owner(owner);
                self.spawn_chain_fetch();
                self.spawn_index_fetch();
            }
            Some(PollerCommand::RefreshChain) => self.spawn_chain_fetch(),
            Some(PollerCommand::RefreshIndex) => self.spawn_index_fetch(),
            Some(PollerCommand::BeginPending(action)) => self.dashboard.begin_pending(action),
            Some(PollerCommand::EndPending(id)) => self.dashboard.end_pending(id),
        }
        true
    }

    fn apply(&mut self, fetched: Fetched) {
        match fetched {
            Fetched::Chain {
                generation,
                seq,
                result,
            } => {
                self.dashboard.apply_chain(generation, seq, result);
            }
            Fetched::Index {
                generation,
                seq,
                result,
            } => {
                self.dashboard.apply_index(generation, seq, result);
            }
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<PollerCommand>,
        views: watch::Sender<DashboardView>,
    ) {
        log::info!(
            "Poller started for {} (chain every {:?}, index every {:?})",
            self.dashboard.tier_view().route(),
            self.settings.chain_every,
            self.settings.index_every
        );
        let mut chain_timer = poll_interval(self.settings.chain_every);
        let mut index_timer = poll_interval(self.settings.index_every);
        let mut ticker: Option<Interval> = None;

        loop {
            tokio::select! {
                command = commands.recv() => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                _ = chain_timer.tick() => self.spawn_chain_fetch(),
                _ = index_timer.tick() => self.spawn_index_fetch(),
                _ = next_tick(&mut ticker) => self.dashboard.tick(now_unix()),
                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    match joined {
                        Ok(fetched) => self.apply(fetched),
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => log::error!("Fetch task failed: {}", e),
                    }
                }
            }

            match (self.dashboard.has_active_positions(), ticker.is_some()) {
                (true, false) => ticker = Some(poll_interval(self.settings.tick_every)),
                (false, true) => ticker = None,
                _ => {}
            }

            views.send_replace(self.dashboard.view(now_unix()));
        }

        self.fetches.shutdown().await;
        log::info!("Poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::views::tier_views;
    use crate::error::StakingError;
    use crate::types::{RawFullState, WalletAsset};
    use alloy_primitives::U256;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn collection() -> Address {
        Address::repeat_byte(0x11)
    }

    struct MockChain {
        stakes: Mutex<Vec<serde_json::Value>>,
        pending: U256,
        reads: AtomicUsize,
        delay: Duration,
        blacklist_delay: Duration,
    }

    impl MockChain {
        fn new(token_ids: &[u64]) -> Self {
            Self::with_rate(token_ids, "1000")
        }

        fn with_rate(token_ids: &[u64], rate: &str) -> Self {
            let stakes = token_ids
                .iter()
                .map(|id| {
                    json!({
                        "collection": collection().to_string(),
                        "tokenId": id,
                        "planIndex": 1,
                        "lockEndTime": 0,
                        "rewardRate": rate,
                        "lastClaimTime": 0
                    })
                })
                .collect();
            Self {
                stakes: Mutex::new(stakes),
                pending: U256::from(5_000_000_000_000_000_000u128),
                reads: AtomicUsize::new(0),
                delay: Duration::ZERO,
                blacklist_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl ChainReader for MockChain {
        async fn get_user_full_state(&self, _owner: Address) -> Result<RawFullState> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                time::sleep(self.delay).await;
            }
            Ok(RawFullState {
                stakes: self.stakes.lock().unwrap().clone(),
                total_pending: self.pending,
            })
        }

        async fn is_blacklisted(&self, _collection: Address, token_id: u64) -> Result<bool> {
            if !self.blacklist_delay.is_zero() {
                time::sleep(self.blacklist_delay).await;
            }
            Ok(token_id == 13)
        }

        async fn is_approved_for_all(&self, _c: Address, _o: Address, _op: Address) -> Result<bool> {
            Err(StakingError::Rpc("not supported".into()))
        }
    }

    struct MockIndex(Vec<u64>);

    #[async_trait]
    impl NftIndex for MockIndex {
        async fn owned_tokens(&self, _owner: Address, collection: Address) -> Result<Vec<WalletAsset>> {
            Ok(self.0.iter().map(|id| WalletAsset::new(collection, *id)).collect())
        }
    }

    fn settings() -> PollerSettings {
        PollerSettings {
            chain_every: Duration::from_secs(3600),
            index_every: Duration::from_secs(3600),
            tick_every: Duration::from_millis(20),
        }
    }

    fn poller(chain: Arc<MockChain>, owned: Vec<u64>) -> Poller {
        let view = tier_views(collection(), Address::repeat_byte(0x22))[0].clone();
        Poller::new(
            chain,
            Arc::new(MockIndex(owned)),
            Dashboard::new(view, "GKY"),
            settings(),
        )
    }

    async fn wait_for<F>(rx: &mut watch::Receiver<DashboardView>, predicate: F) -> DashboardView
    where
        F: Fn(&DashboardView) -> bool,
    {
        time::timeout(Duration::from_secs(5), async {
            loop {
                let current = rx.borrow_and_update().clone();
                if predicate(&current) {
                    return current;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("view never reached the expected state")
    }

    #[tokio::test]
    async fn test_switch_owner_publishes_reconciled_view() {
        let chain = Arc::new(MockChain::new(&[5]));
        let (handle, task) = poller(chain, vec![5, 7, 13]).spawn();
        let mut views = handle.subscribe();

        handle.switch_owner(Address::repeat_byte(0xaa));
        let view = wait_for(&mut views, |v| v.has_snapshot && v.available.len() == 2).await;

        assert_eq!(view.owner, Some(Address::repeat_byte(0xaa)));
        assert_eq!(view.active_count, 1);
        assert_eq!(view.staked[0].token_id, 5);
        assert!(view.pending_rewards.starts_with("5.000000"));
        assert_eq!(view.approved, None);
        assert_eq!(
            view.available_card(13).unwrap().action,
            crate::actions::AssetAction::Restricted
        );

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_requests_new_read() {
        let chain = Arc::new(MockChain::new(&[]));
        let (handle, task) = poller(chain.clone(), vec![]).spawn();
        let mut views = handle.subscribe();

        handle.switch_owner(Address::repeat_byte(0xaa));
        wait_for(&mut views, |v| v.has_snapshot).await;
        let before = chain.reads.load(Ordering::SeqCst);

        handle.send(PollerCommand::RefreshChain);
        time::timeout(Duration::from_secs(5), async {
            while chain.reads.load(Ordering::SeqCst) == before {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_aborts_inflight_fetches() {
        let mut chain = MockChain::new(&[5]);
        chain.delay = Duration::from_secs(3600);
        let (handle, task) = poller(Arc::new(chain), vec![]).spawn();

        handle.switch_owner(Address::repeat_byte(0xaa));
        handle.shutdown();
        time::timeout(Duration::from_secs(5), task)
            .await
            .expect("poller did not stop")
            .unwrap();
        assert!(!handle.view().has_snapshot);
    }

    #[tokio::test]
    async fn test_pending_markers_round_trip_through_commands() {
        let chain = Arc::new(MockChain::new(&[]));
        let (handle, task) = poller(chain, vec![7]).spawn();
        let mut views = handle.subscribe();

        handle.switch_owner(Address::repeat_byte(0xaa));
        wait_for(&mut views, |v| v.available.len() == 1).await;

        handle.send(PollerCommand::BeginPending(PendingAction {
            id: 9,
            kind: crate::dashboard::PendingKind::Stake,
            token_ids: vec![7],
        }));
        wait_for(&mut views, |v| v.available[0].pending).await;

        handle.send(PollerCommand::EndPending(9));
        wait_for(&mut views, |v| v.pending.is_empty() && !v.available[0].pending).await;

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_tick_runs_only_while_something_is_staked() {
        let mut chain = MockChain::with_rate(&[5], "100000000000000000");
        chain.pending = U256::from(1_000_000_000_000_000_000u128);
        let chain = Arc::new(chain);
        let (handle, task) = poller(chain.clone(), vec![]).spawn();
        let mut views = handle.subscribe();

        handle.switch_owner(Address::repeat_byte(0xaa));
        wait_for(&mut views, |v| v.has_snapshot && v.active_count == 1).await;
        // 0.1 per second on top of 1.0 once the wall clock moves on
        let grown = wait_for(&mut views, |v| v.pending_rewards != "1.000000").await;
        assert_eq!(grown.active_count, 1);
        assert!(grown.pending_rewards.as_str() > "1.000000");

        chain.stakes.lock().unwrap().clear();
        handle.send(PollerCommand::RefreshChain);
        let frozen = wait_for(&mut views, |v| v.active_count == 0).await;
        assert_eq!(frozen.pending_rewards, "1.000000");

        // With the tick disarmed and polls far apart, nothing new is published
        let quiet = time::timeout(Duration::from_millis(1_500), views.changed()).await;
        assert!(quiet.is_err());
        assert_eq!(handle.view().pending_rewards, "1.000000");

        handle.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_blacklist_checks_run_concurrently() {
        let mut chain = MockChain::new(&[]);
        chain.blacklist_delay = Duration::from_millis(200);
        let owned: Vec<u64> = (1..=20).collect();
        let view = tier_views(collection(), Address::repeat_byte(0x22))[0].clone();

        let started = std::time::Instant::now();
        let fetch = read_index(
            Arc::new(chain),
            Arc::new(MockIndex(owned)),
            Address::repeat_byte(0xaa),
            view,
        )
        .await
        .unwrap();

        // One at a time would take 4s
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(fetch.assets.len(), 20);
        assert_eq!(fetch.blacklisted, HashSet::from([13]));
    }
}
