//! Display-only token figures: price ticker, live transaction feed and the
//! swap calculator. Nothing here touches a chain.

pub mod feed;
pub mod swap;

pub use feed::{FeedHandle, LiveTransaction, Side, TransactionFeed};
pub use swap::{quote, Asset, Quote};

use crate::error::Result;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fixed TVLP price in USDT.
pub const TVLP_PRICE: f64 = 184.0;
pub const TOTAL_SUPPLY: f64 = 1_000_000.0;

const PRICE_FLOOR: f64 = 180.0;
const PRICE_CEILING: f64 = 188.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub price: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
    pub liquidity: f64,
    pub market_cap: f64,
}

impl Default for TokenData {
    fn default() -> Self {
        Self {
            price: TVLP_PRICE,
            change_24h: 12.5,
            volume_24h: 2_500_000.0,
            liquidity: 920_000.0,
            market_cap: TVLP_PRICE * TOTAL_SUPPLY,
        }
    }
}

#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn token_data(&self) -> Result<TokenData>;
}

/// Random walk around the fixed price.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedFeed;

impl SimulatedFeed {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> TokenData {
        let fluctuation = rng.gen_range(-1.0..1.0);
        let price = (TVLP_PRICE + fluctuation).clamp(PRICE_FLOOR, PRICE_CEILING);
        let change_24h = (price - TVLP_PRICE) / TVLP_PRICE * 100.0 + rng.gen_range(-2.5..2.5);

        TokenData {
            price,
            change_24h,
            volume_24h: 2_000_000.0 + rng.gen_range(0.0..1_000_000.0),
            liquidity: 900_000.0 + rng.gen_range(0.0..100_000.0),
            market_cap: price * TOTAL_SUPPLY,
        }
    }
}

#[async_trait]
impl MarketFeed for SimulatedFeed {
    async fn token_data(&self) -> Result<TokenData> {
        Ok(Self::sample(&mut rand::thread_rng()))
    }
}

/// Rounds half away from zero to `places` decimals.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
