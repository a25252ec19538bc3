//! Block-farming tracker.
//!
//! Subscribes to new block headers, detects blocks produced by the
//! configured reward address, computes their reward from chain-state events,
//! maintains the persisted ledger, and publishes events for the presentation
//! layer.
//!
//! Per-block failures (RPC errors, malformed digests, missing events) are
//! logged and degrade to "not farmed" for that block only; the subscription
//! itself only ends through `stop()` or loss of the head stream.

use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::chain::{ChainSource, EventRecord, HeadStream};
use crate::config::ConfigStore;
use crate::digest;
use crate::error::{Error, Result};
use crate::events::{EventBus, FarmEvent};
use crate::ledger::{BlockLedger, FarmedBlock};

/// Subunits per CRS (18 decimals).
pub const SUBUNITS_PER_CRS: u128 = 1_000_000_000_000_000_000;

/// Subunits per displayed cent; rewards are shown with two decimal places.
const SUBUNITS_PER_CENT: u128 = SUBUNITS_PER_CRS / 100;

/// Lifecycle of the tracker's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Subscribing,
    Active,
    Stopped,
}

/// Handles owned while a subscription is running. Taken exactly once by
/// `stop()`, which makes every stop path share one idempotent teardown.
struct ActiveSubscription {
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
    hook_cancel: Arc<Notify>,
}

/// State shared with the worker task.
struct WorkerContext {
    chain: Arc<dyn ChainSource>,
    farmed: Arc<StdMutex<Vec<FarmedBlock>>>,
    events: EventBus,
    reward_address: String,
    ledger_file: PathBuf,
    explorer_url: String,
}

/// The farming tracker.
pub struct FarmTracker {
    chain: Arc<dyn ChainSource>,
    config: ConfigStore,
    events: EventBus,
    farmed: Arc<StdMutex<Vec<FarmedBlock>>>,
    first_load: AtomicBool,
    state: StdMutex<TrackerState>,
    active: Mutex<Option<ActiveSubscription>>,
}

impl FarmTracker {
    pub fn new(chain: Arc<dyn ChainSource>, config: ConfigStore) -> Self {
        Self {
            chain,
            config,
            events: EventBus::new(),
            farmed: Arc::new(StdMutex::new(Vec::new())),
            first_load: AtomicBool::new(false),
            state: StdMutex::new(TrackerState::Idle),
            active: Mutex::new(None),
        }
    }

    /// Subscribe to tracker events.
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<FarmEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the in-memory farmed-block history, newest first.
    pub fn farmed_blocks(&self) -> Vec<FarmedBlock> {
        self.farmed.lock().expect("history lock").clone()
    }

    pub fn state(&self) -> TrackerState {
        *self.state.lock().expect("state lock")
    }

    /// Whether an earlier flow already loaded history and started tracking
    /// this session.
    pub fn is_first_load(&self) -> bool {
        self.first_load.load(Ordering::SeqCst)
    }

    /// Mark the session as already bootstrapped (history loaded).
    pub fn set_first_load(&self) {
        self.first_load.store(true, Ordering::SeqCst);
    }

    /// Start tracking farmed blocks.
    ///
    /// Fails fast with [`Error::Configuration`] when no reward address is
    /// configured; no subscription is created in that case. A second call
    /// while already active is a logged no-op.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            tracing::warn!("Block subscription already active, ignoring start");
            return Ok(());
        }

        let config = self
            .config
            .read()
            .await
            .map_err(|e| Error::Configuration(e.to_string()))?;
        if config.reward_address.is_empty() {
            tracing::error!("Reward address should not have been empty");
            return Err(Error::Configuration(
                "reward address is empty".to_string(),
            ));
        }

        self.set_state(TrackerState::Subscribing);
        self.chain.connect().await.inspect_err(|_| {
            self.set_state(TrackerState::Idle);
        })?;
        let heads = self.chain.subscribe_new_heads().await.inspect_err(|_| {
            self.set_state(TrackerState::Idle);
        })?;

        // The plotting-progress flow loads history before reaching here; any
        // other entry point loads it now, once per session.
        if !self.is_first_load() {
            *self.farmed.lock().expect("history lock") = BlockLedger::load(&config.ledger_file);
            self.set_first_load();
        }

        let context = WorkerContext {
            chain: Arc::clone(&self.chain),
            farmed: Arc::clone(&self.farmed),
            events: self.events.clone(),
            reward_address: config.reward_address.clone(),
            ledger_file: config.ledger_file.clone(),
            explorer_url: config.explorer_url.clone(),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(run_subscription(context, heads, shutdown_rx));

        // Teardown hook: an interrupt stops and flushes exactly like an
        // explicit stop. Deregistered by stop() itself.
        let hook_cancel = Arc::new(Notify::new());
        let hook_tracker = Arc::clone(self);
        let cancel = Arc::clone(&hook_cancel);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupt received, stopping block subscription");
                    hook_tracker.stop().await;
                }
                _ = cancel.notified() => {}
            }
        });

        *active = Some(ActiveSubscription {
            shutdown: shutdown_tx,
            worker,
            hook_cancel,
        });
        self.set_state(TrackerState::Active);
        tracing::info!(
            "Tracking blocks farmed to {}",
            config.reward_address
        );
        Ok(())
    }

    /// Stop tracking: unsubscribe, flush the ledger, disconnect.
    ///
    /// Safe to call from any number of places (interrupt hook, shell
    /// teardown, explicit command); only the first call does work, the rest
    /// return immediately. Every sub-step is best-effort.
    pub async fn stop(&self) {
        let subscription = match self.active.lock().await.take() {
            Some(s) => s,
            None => {
                tracing::debug!("Block subscription already stopped");
                return;
            }
        };

        tracing::info!("Block subscription stop triggered");

        // The worker drops the head stream (which unsubscribes) and flushes
        // the ledger before exiting.
        let _ = subscription.shutdown.send(true);
        if let Err(e) = subscription.worker.await {
            tracing::warn!("Subscription worker ended abnormally: {}", e);
        }

        self.chain.disconnect().await;
        subscription.hook_cancel.notify_waiters();
        self.set_state(TrackerState::Stopped);
        tracing::info!("Block subscription stopped");
    }

    fn set_state(&self, state: TrackerState) {
        *self.state.lock().expect("state lock") = state;
    }
}

/// Worker loop: one header at a time, in delivery order. Processing errors
/// never end the loop.
async fn run_subscription(
    context: WorkerContext,
    mut heads: HeadStream,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let header = tokio::select! {
            _ = shutdown.changed() => break,
            next = heads.next() => match next {
                Some(header) => header,
                None => {
                    tracing::warn!("Header stream ended; stop and restart to resume tracking");
                    break;
                }
            },
        };

        let height = header.number;
        if let Err(e) = process_header(&context, height).await {
            tracing::warn!("Skipping block {}: {}", height, e);
        }

        // Liveness signal, independent of whether the block was ours.
        context.events.emit(FarmEvent::NewBlock { height });
    }

    // Dropping the stream unsubscribes from the node.
    drop(heads);

    let snapshot = context.farmed.lock().expect("history lock").clone();
    if let Err(e) = BlockLedger::save(&context.ledger_file, &snapshot) {
        tracing::warn!("Failed to flush ledger on shutdown: {}", e);
    }
}

/// Handle a single header: detect local production and record the reward.
async fn process_header(context: &WorkerContext, height: u64) -> Result<()> {
    let hash = context.chain.block_hash(height).await?;
    let block = context.chain.block_by_hash(&hash).await?;

    let producer = digest::producer_reward_address(&block.block.header.digest.logs)?;
    if producer != context.reward_address {
        return Ok(());
    }
    tracing::info!("Farmed by me: {}", height);

    let records = context.chain.events_at(&hash).await?;
    let block_reward = block_reward_amount(&records);

    let farmed = FarmedBlock {
        hash,
        detected_at: chrono::Utc::now().to_rfc3339(),
        height,
        block_reward,
        fee_reward: 0.0,
        reward_address: context.reward_address.clone(),
        transactions: 0,
        explorer_link: format!("{}{}", context.explorer_url, height),
    };

    // Read-modify-write of the shared history in one suspend-free section;
    // the worker is the only mutator.
    let snapshot = {
        let mut blocks = context.farmed.lock().expect("history lock");
        BlockLedger::prepend(&mut blocks, farmed.clone());
        blocks.clone()
    };
    if let Err(e) = BlockLedger::save(&context.ledger_file, &snapshot) {
        tracing::warn!("Failed to persist ledger: {}", e);
    }

    context.events.emit(FarmEvent::Farmed(farmed));
    Ok(())
}

/// Reward amount from the block's `rewards.BlockReward` event, in CRS
/// truncated to two decimal places. Absent or malformed events yield zero.
fn block_reward_amount(records: &[EventRecord]) -> f64 {
    for record in records {
        if record.section == "rewards" && record.method == "BlockReward" {
            if let Some(amount) = record.data.get(1).and_then(decode_u128) {
                return (amount / SUBUNITS_PER_CENT) as f64 / 100.0;
            }
        }
    }
    0.0
}

/// Event amounts arrive as decimal strings, hex strings, or plain numbers.
fn decode_u128(value: &serde_json::Value) -> Option<u128> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map(u128::from),
        serde_json::Value::String(s) => {
            let s = s.trim();
            match s.strip_prefix("0x") {
                Some(hex_part) => u128::from_str_radix(hex_part, 16).ok(),
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
}
