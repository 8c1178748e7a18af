//! Market data sources.
//!
//! The engine only sees the [`MarketData`] capability; exchange bindings and
//! caching live behind it.

pub mod binance;

pub use binance::BinanceClient;

use crate::services::Cache;
use crate::types::{PriceBar, Series};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Market data errors. Both are recoverable: the symbol is skipped this tick.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Fetch timed out: {0}")]
    Timeout(String),
}

/// Boxed future returned by [`MarketData`] methods.
pub type DataFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DataError>> + Send + 'a>>;

/// Price data retrieval capability.
pub trait MarketData: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Latest `limit` bars for `symbol` at `timeframe`, oldest first.
    fn get_series<'a>(&'a self, symbol: &'a str, timeframe: &'a str, limit: usize)
        -> DataFuture<'a, Series>;

    /// Current (last trade) price.
    fn get_price<'a>(&'a self, symbol: &'a str) -> DataFuture<'a, f64>;
}

/// Wraps a source with a short-lived cache for series and prices.
pub struct CachedMarketData<M> {
    inner: M,
    series: Cache<Vec<PriceBar>>,
    prices: Cache<f64>,
}

impl<M: MarketData> CachedMarketData<M> {
    pub fn new(inner: M, ttl: Duration) -> Self {
        Self {
            inner,
            series: Cache::new(ttl),
            prices: Cache::new(ttl),
        }
    }

    /// Drop expired entries from both caches.
    pub fn purge_expired(&self) -> usize {
        self.series.purge_expired() + self.prices.purge_expired()
    }
}

impl<M: MarketData> MarketData for CachedMarketData<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get_series<'a>(
        &'a self,
        symbol: &'a str,
        timeframe: &'a str,
        limit: usize,
    ) -> DataFuture<'a, Series> {
        Box::pin(async move {
            let key = format!("{}:{}:{}", symbol, timeframe, limit);
            if let Some(series) = self.series.get(&key) {
                debug!("Series cache hit for {}", key);
                return Ok(series);
            }
            let series = self.inner.get_series(symbol, timeframe, limit).await?;
            self.series.insert(key, series.clone());
            Ok(series)
        })
    }

    fn get_price<'a>(&'a self, symbol: &'a str) -> DataFuture<'a, f64> {
        Box::pin(async move {
            if let Some(price) = self.prices.get(symbol) {
                return Ok(price);
            }
            let price = self.inner.get_price(symbol).await?;
            self.prices.insert(symbol, price);
            Ok(price)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl MarketData for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        fn get_series<'a>(
            &'a self,
            _symbol: &'a str,
            _timeframe: &'a str,
            limit: usize,
        ) -> DataFuture<'a, Series> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Ok((0..limit)
                    .map(|i| PriceBar::new(i as i64, 1.0, 1.0, 1.0, 1.0, 1.0))
                    .collect())
            })
        }

        fn get_price<'a>(&'a self, symbol: &'a str) -> DataFuture<'a, f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if symbol == "BAD" {
                    Err(DataError::DataUnavailable(symbol.to_string()))
                } else {
                    Ok(10.0)
                }
            })
        }
    }

    #[tokio::test]
    async fn test_cached_source_hits_inner_once() {
        let cached = CachedMarketData::new(
            CountingSource {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(60),
        );

        assert_eq!(cached.get_price("BTCUSDT").await, Ok(10.0));
        assert_eq!(cached.get_price("BTCUSDT").await, Ok(10.0));
        assert_eq!(cached.get_series("BTCUSDT", "1h", 5).await.unwrap().len(), 5);
        assert_eq!(cached.get_series("BTCUSDT", "1h", 5).await.unwrap().len(), 5);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cached = CachedMarketData::new(
            CountingSource {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(60),
        );
        assert!(cached.get_price("BAD").await.is_err());
        assert!(cached.get_price("BAD").await.is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_purge_sweeps_both_caches() {
        let cached = CachedMarketData::new(
            CountingSource {
                calls: AtomicUsize::new(0),
            },
            Duration::from_millis(200),
        );
        cached.get_price("BTCUSDT").await.unwrap();
        cached.get_series("BTCUSDT", "1h", 3).await.unwrap();
        assert_eq!(cached.purge_expired(), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cached.purge_expired(), 2);
        assert_eq!(cached.purge_expired(), 0);
    }
}
