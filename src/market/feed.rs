use crate::market::{round_to, TVLP_PRICE};
use crate::utils::Sleeper;
use chrono::{DateTime, Utc};
use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const RECENT_TRANSACTIONS_LIMIT: usize = 5;
const SEED_TRANSACTIONS: usize = 3;
const BUY_PROBABILITY: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveTransaction {
    pub id: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub amount: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub address: String,
}

impl LiveTransaction {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let side = if rng.gen_bool(BUY_PROBABILITY) {
            Side::Buy
        } else {
            Side::Sell
        };
        let suffix: String = (0..9)
            .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
            .collect();
        let address: String = (0..8)
            .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_uppercase())
            .collect();
        let now = Utc::now();

        Self {
            id: format!("{}{}", now.timestamp_millis(), suffix),
            side,
            amount: round_to(rng.gen_range(1.0..51.0), 3),
            price: round_to(TVLP_PRICE + rng.gen_range(-2.0..2.0), 2),
            timestamp: now,
            address: format!("T{}", address),
        }
    }
}

/// The most recent simulated trades, newest first.
#[derive(Debug, Clone)]
pub struct TransactionFeed {
    recent: Arc<Mutex<VecDeque<LiveTransaction>>>,
}

impl Default for TransactionFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionFeed {
    /// A feed pre-filled with a few trades.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let recent = (0..SEED_TRANSACTIONS)
            .map(|_| LiveTransaction::generate(&mut rng))
            .collect();
        Self {
            recent: Arc::new(Mutex::new(recent)),
        }
    }

    pub fn empty() -> Self {
        Self {
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(RECENT_TRANSACTIONS_LIMIT))),
        }
    }

    pub async fn push(&self, transaction: LiveTransaction) {
        let mut recent = self.recent.lock().await;
        recent.push_front(transaction);
        recent.truncate(RECENT_TRANSACTIONS_LIMIT);
    }

    pub async fn snapshot(&self) -> Vec<LiveTransaction> {
        self.recent.lock().await.iter().cloned().collect()
    }

    /// Adds a trade every 3-5 s. With `reduced_motion` the feed stays static
    /// and no task is started.
    pub fn spawn(&self, sleeper: Arc<dyn Sleeper>, reduced_motion: bool) -> Option<FeedHandle> {
        if reduced_motion {
            debug!("Reduced motion requested; transaction feed stays static");
            return None;
        }

        let feed = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let delay = Duration::from_millis(rand::thread_rng().gen_range(3000..5000));
                sleeper.sleep(delay).await;
                let transaction = LiveTransaction::generate(&mut rand::thread_rng());
                feed.push(transaction).await;
            }
        });
        Some(FeedHandle { handle })
    }
}

/// Stops the ticker when dropped.
pub struct FeedHandle {
    handle: JoinHandle<()>,
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
