//! Integration tests for the farming tracker.
//!
//! These drive the tracker against an in-memory chain source and verify:
//! - farm detection and reward computation for a header stream
//! - event emission and ordering
//! - stop() idempotence
//! - fail-fast start preconditions
//! - ledger load/reload behavior across the first-load guard

use async_trait::async_trait;
use codec::Encode;
use futures::StreamExt;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

use ceres_farm_console::chain::{
    BlockBody, ChainHeader, ChainSource, EventRecord, HeadStream, HeaderDigest, SignedBlock,
};
use ceres_farm_console::config::{ConfigStore, ConsoleConfig};
use ceres_farm_console::digest::{DigestLog, FarmerSolution, PreDigest, POC_ENGINE_ID};
use ceres_farm_console::error::Error;
use ceres_farm_console::events::FarmEvent;
use ceres_farm_console::identity::encode_address;
use ceres_farm_console::ledger::BlockLedger;
use ceres_farm_console::tracker::{FarmTracker, TrackerState};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// In-memory chain source
// ============================================================================

#[derive(Default)]
struct MockChain {
    /// Headers delivered by the subscription, in order. Taken on subscribe.
    headers: Mutex<Vec<ChainHeader>>,
    /// Blocks by hash.
    blocks: Mutex<HashMap<String, SignedBlock>>,
    /// Event records by block hash.
    events: Mutex<HashMap<String, Vec<EventRecord>>>,
    /// When set, the subscription never yields (worker stays alive until
    /// stopped).
    hang: bool,
    subscribes: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MockChain {
    fn new() -> Self {
        Self::default()
    }

    fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Register a block at `height` whose header digest carries a
    /// pre-runtime solution for `reward_address`.
    fn add_block(&self, height: u64, logs: Vec<String>, records: Vec<EventRecord>) {
        let hash = mock_hash(height);
        let header = ChainHeader {
            parent_hash: mock_hash(height.saturating_sub(1)),
            number: height,
            digest: HeaderDigest { logs },
        };
        self.headers.lock().unwrap().push(header.clone());
        self.blocks.lock().unwrap().insert(
            hash.clone(),
            SignedBlock {
                block: BlockBody {
                    header,
                    extrinsics: Vec::new(),
                },
            },
        );
        self.events.lock().unwrap().insert(hash, records);
    }
}

#[async_trait]
impl ChainSource for MockChain {
    async fn connect(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn subscribe_new_heads(&self) -> Result<HeadStream, Error> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            return Ok(futures::stream::pending().boxed());
        }
        let headers: Vec<ChainHeader> = self.headers.lock().unwrap().drain(..).collect();
        Ok(futures::stream::iter(headers).boxed())
    }

    async fn block_hash(&self, height: u64) -> Result<String, Error> {
        Ok(mock_hash(height))
    }

    async fn block_by_hash(&self, hash: &str) -> Result<SignedBlock, Error> {
        self.blocks
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| Error::Network(format!("unknown block {}", hash)))
    }

    async fn events_at(&self, hash: &str) -> Result<Vec<EventRecord>, Error> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .unwrap_or_default())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn mock_hash(height: u64) -> String {
    format!("0x{:064x}", height)
}

fn pre_runtime_log(reward_address: [u8; 32]) -> String {
    let pre_digest = PreDigest {
        slot: 1,
        solution: FarmerSolution {
            public_key: [3u8; 32],
            reward_address,
        },
    };
    let log = DigestLog::PreRuntime(POC_ENGINE_ID, pre_digest.encode());
    format!("0x{}", hex::encode(log.encode()))
}

fn reward_event(amount: &str) -> EventRecord {
    EventRecord {
        section: "rewards".to_string(),
        method: "BlockReward".to_string(),
        data: vec![json!("winner"), json!(amount)],
    }
}

async fn test_store(dir: &Path, reward_address: &str) -> ConfigStore {
    let store = ConfigStore::new(dir.join("config.toml"));
    let mut config = ConsoleConfig::default();
    config.reward_address = reward_address.to_string();
    config.ledger_file = dir.join("ledger.json");
    store.write(&config).await.unwrap();
    store
}

async fn next_event(
    rx: &mut tokio::sync::broadcast::Receiver<FarmEvent>,
) -> FarmEvent {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

// ============================================================================
// Detection scenario
// ============================================================================

#[tokio::test]
async fn test_detects_farmed_block_and_computes_reward() {
    let dir = TempDir::new().unwrap();
    let my_key = [9u8; 32];
    let my_address = encode_address(&my_key);

    let chain = Arc::new(MockChain::new());
    // h100: farmed by someone else. h101: farmed by me, 5 CRS reward.
    chain.add_block(100, vec![pre_runtime_log([1u8; 32])], Vec::new());
    chain.add_block(
        101,
        vec![pre_runtime_log(my_key)],
        vec![reward_event("5000000000000000000")],
    );

    let store = test_store(dir.path(), &my_address).await;
    let tracker = Arc::new(FarmTracker::new(chain.clone(), store));
    let mut events = tracker.subscribe_events();

    tracker.start().await.unwrap();
    assert_eq!(tracker.state(), TrackerState::Active);

    // h100 is not ours: liveness event only.
    match next_event(&mut events).await {
        FarmEvent::NewBlock { height } => assert_eq!(height, 100),
        other => panic!("expected NewBlock(100), got {:?}", other),
    }

    // h101 is ours: Farmed precedes its NewBlock.
    let farmed = match next_event(&mut events).await {
        FarmEvent::Farmed(block) => block,
        other => panic!("expected Farmed, got {:?}", other),
    };
    match next_event(&mut events).await {
        FarmEvent::NewBlock { height } => assert_eq!(height, 101),
        other => panic!("expected NewBlock(101), got {:?}", other),
    }

    assert_eq!(farmed.height, 101);
    assert_eq!(farmed.hash, mock_hash(101));
    assert!((farmed.block_reward - 5.0).abs() < f64::EPSILON);
    assert_eq!(farmed.fee_reward, 0.0);
    assert_eq!(farmed.reward_address, my_address);
    assert!(farmed.explorer_link.ends_with("101"));

    tracker.stop().await;
    assert_eq!(tracker.state(), TrackerState::Stopped);

    // Only the locally farmed block is in the ledger, and it round-trips.
    let persisted = BlockLedger::load(&dir.path().join("ledger.json"));
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0], farmed);
}

#[tokio::test]
async fn test_ledger_orders_newest_first() {
    let dir = TempDir::new().unwrap();
    let my_key = [4u8; 32];
    let my_address = encode_address(&my_key);

    let chain = Arc::new(MockChain::new());
    chain.add_block(200, vec![pre_runtime_log(my_key)], Vec::new());
    chain.add_block(201, vec![pre_runtime_log(my_key)], Vec::new());

    let store = test_store(dir.path(), &my_address).await;
    let tracker = Arc::new(FarmTracker::new(chain, store));
    let mut events = tracker.subscribe_events();

    tracker.start().await.unwrap();

    // Two farmed blocks, four events in total.
    for _ in 0..4 {
        let _ = next_event(&mut events).await;
    }
    tracker.stop().await;

    let blocks = tracker.farmed_blocks();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].height, 201);
    assert_eq!(blocks[1].height, 200);
}

#[tokio::test]
async fn test_block_without_reward_event_records_zero() {
    let dir = TempDir::new().unwrap();
    let my_key = [6u8; 32];
    let my_address = encode_address(&my_key);

    let chain = Arc::new(MockChain::new());
    chain.add_block(300, vec![pre_runtime_log(my_key)], Vec::new());

    let store = test_store(dir.path(), &my_address).await;
    let tracker = Arc::new(FarmTracker::new(chain, store));
    let mut events = tracker.subscribe_events();

    tracker.start().await.unwrap();

    let farmed = match next_event(&mut events).await {
        FarmEvent::Farmed(block) => block,
        other => panic!("expected Farmed, got {:?}", other),
    };
    assert_eq!(farmed.block_reward, 0.0);

    tracker.stop().await;
}

#[tokio::test]
async fn test_malformed_digest_degrades_to_not_farmed() {
    let dir = TempDir::new().unwrap();
    let my_address = encode_address(&[8u8; 32]);

    let chain = Arc::new(MockChain::new());
    // No pre-runtime log at all.
    chain.add_block(400, vec!["0xff00".to_string()], Vec::new());

    let store = test_store(dir.path(), &my_address).await;
    let tracker = Arc::new(FarmTracker::new(chain, store));
    let mut events = tracker.subscribe_events();

    tracker.start().await.unwrap();

    // Liveness event still arrives; no Farmed event, no ledger entry.
    match next_event(&mut events).await {
        FarmEvent::NewBlock { height } => assert_eq!(height, 400),
        other => panic!("expected NewBlock(400), got {:?}", other),
    }
    tracker.stop().await;

    assert!(tracker.farmed_blocks().is_empty());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_empty_reward_address_fails_fast() {
    let dir = TempDir::new().unwrap();
    let chain = Arc::new(MockChain::new());

    let store = test_store(dir.path(), "").await;
    let tracker = Arc::new(FarmTracker::new(chain.clone(), store));

    let result = tracker.start().await;
    assert!(matches!(result, Err(Error::Configuration(_))));

    // No subscription was created and nothing was written.
    assert_eq!(chain.subscribes.load(Ordering::SeqCst), 0);
    assert_eq!(tracker.state(), TrackerState::Idle);
    assert!(!dir.path().join("ledger.json").exists());
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let my_address = encode_address(&[2u8; 32]);

    let chain = Arc::new(MockChain::hanging());
    let store = test_store(dir.path(), &my_address).await;
    let tracker = Arc::new(FarmTracker::new(chain.clone(), store));

    tracker.start().await.unwrap();
    assert_eq!(tracker.state(), TrackerState::Active);

    tracker.stop().await;
    tracker.stop().await;
    tracker.stop().await;

    // One unsubscribe/disconnect/flush regardless of how many stop paths ran.
    assert_eq!(chain.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(tracker.state(), TrackerState::Stopped);
    assert!(dir.path().join("ledger.json").exists());
}

#[tokio::test]
async fn test_double_start_does_not_double_subscribe() {
    let dir = TempDir::new().unwrap();
    let my_address = encode_address(&[2u8; 32]);

    let chain = Arc::new(MockChain::hanging());
    let store = test_store(dir.path(), &my_address).await;
    let tracker = Arc::new(FarmTracker::new(chain.clone(), store));

    tracker.start().await.unwrap();
    tracker.start().await.unwrap();

    assert_eq!(chain.subscribes.load(Ordering::SeqCst), 1);
    tracker.stop().await;
}

#[tokio::test]
async fn test_start_reloads_persisted_history_once() {
    let dir = TempDir::new().unwrap();
    let my_address = encode_address(&[5u8; 32]);
    let ledger_file = dir.path().join("ledger.json");

    // A previous session left one farmed block behind.
    let previous = ceres_farm_console::ledger::FarmedBlock {
        hash: mock_hash(50),
        detected_at: "2026-01-01T00:00:00+00:00".to_string(),
        height: 50,
        block_reward: 1.0,
        fee_reward: 0.0,
        reward_address: my_address.clone(),
        transactions: 0,
        explorer_link: "https://apps.ceres.farm/#/explorer/query/50".to_string(),
    };
    BlockLedger::save(&ledger_file, std::slice::from_ref(&previous)).unwrap();

    let chain = Arc::new(MockChain::hanging());
    let store = test_store(dir.path(), &my_address).await;
    let tracker = Arc::new(FarmTracker::new(chain, store));

    assert!(!tracker.is_first_load());
    tracker.start().await.unwrap();

    assert!(tracker.is_first_load());
    assert_eq!(tracker.farmed_blocks(), vec![previous]);

    tracker.stop().await;
}

#[tokio::test]
async fn test_first_load_guard_skips_reload() {
    let dir = TempDir::new().unwrap();
    let my_address = encode_address(&[5u8; 32]);
    let ledger_file = dir.path().join("ledger.json");

    let previous = ceres_farm_console::ledger::FarmedBlock {
        hash: mock_hash(50),
        detected_at: "2026-01-01T00:00:00+00:00".to_string(),
        height: 50,
        block_reward: 1.0,
        fee_reward: 0.0,
        reward_address: my_address.clone(),
        transactions: 0,
        explorer_link: "https://apps.ceres.farm/#/explorer/query/50".to_string(),
    };
    BlockLedger::save(&ledger_file, std::slice::from_ref(&previous)).unwrap();

    let chain = Arc::new(MockChain::hanging());
    let store = test_store(dir.path(), &my_address).await;
    let tracker = Arc::new(FarmTracker::new(chain, store));

    // An earlier flow already owns the bootstrap.
    tracker.set_first_load();
    tracker.start().await.unwrap();

    assert!(tracker.farmed_blocks().is_empty());
    tracker.stop().await;
}
