pub mod coingecko;

use crate::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One observed price; lives for a single monitor cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSample {
    pub asset_id: String,
    pub price: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Source of current market prices for a single asset.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, asset_id: &str) -> Result<PriceSample, FetchError>;
}
