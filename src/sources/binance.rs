use super::{DataError, DataFuture, MarketData};
use crate::types::{is_strictly_ordered, PriceBar, Series};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://api.binance.com/api/v3";

/// Largest kline page Binance serves.
const MAX_KLINES: usize = 1000;

/// Binance `ticker/price` response.
#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

/// Binance REST client.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BinanceClient {
    /// Create a new Binance client.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent("Cryptoscope/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<Value> {
        let url = format!("{}/{}", self.base_url, path);

        let mut request = self.client.get(&url).query(query);
        if let Some(ref key) = self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(
                "Binance API returned {}: {}",
                status,
                &text[..text.len().min(200)]
            );
            return Err(anyhow::anyhow!("Binance API error: {}", status));
        }

        Ok(response.json().await?)
    }

    async fn fetch_series(&self, symbol: &str, timeframe: &str, limit: usize) -> anyhow::Result<Series> {
        let query = [
            ("symbol", symbol.to_uppercase()),
            ("interval", timeframe.to_string()),
            ("limit", limit.clamp(1, MAX_KLINES).to_string()),
        ];
        let body = self.get_json("klines", &query).await?;
        let rows = body
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("klines response is not an array"))?;

        let series = rows.iter().map(parse_kline).collect::<anyhow::Result<Series>>()?;
        if !is_strictly_ordered(&series) {
            return Err(anyhow::anyhow!("klines for {} are not strictly ordered", symbol));
        }

        debug!("Binance returned {} {} bars for {}", series.len(), timeframe, symbol);
        Ok(series)
    }

    async fn fetch_price(&self, symbol: &str) -> anyhow::Result<f64> {
        let body = self
            .get_json("ticker/price", &[("symbol", symbol.to_uppercase())])
            .await?;
        let ticker: TickerPrice = serde_json::from_value(body)?;
        let price: f64 = ticker.price.parse()?;
        if !price.is_finite() || price <= 0.0 {
            return Err(anyhow::anyhow!("invalid price {} for {}", price, symbol));
        }
        Ok(price)
    }
}

impl MarketData for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    fn get_series<'a>(
        &'a self,
        symbol: &'a str,
        timeframe: &'a str,
        limit: usize,
    ) -> DataFuture<'a, Series> {
        Box::pin(async move {
            self.fetch_series(symbol, timeframe, limit)
                .await
                .map_err(|e| DataError::DataUnavailable(format!("{} klines: {}", symbol, e)))
        })
    }

    fn get_price<'a>(&'a self, symbol: &'a str) -> DataFuture<'a, f64> {
        Box::pin(async move {
            self.fetch_price(symbol)
                .await
                .map_err(|e| DataError::DataUnavailable(format!("{} price: {}", symbol, e)))
        })
    }
}

/// Parse one kline row: `[open_time, "open", "high", "low", "close", "volume", ...]`.
fn parse_kline(row: &Value) -> anyhow::Result<PriceBar> {
    let fields = row
        .as_array()
        .filter(|f| f.len() >= 6)
        .ok_or_else(|| anyhow::anyhow!("malformed kline row"))?;

    let timestamp = fields[0]
        .as_i64()
        .ok_or_else(|| anyhow::anyhow!("kline open time is not an integer"))?;
    let num = |i: usize| -> anyhow::Result<f64> {
        match &fields[i] {
            Value::String(s) => Ok(s.parse()?),
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| anyhow::anyhow!("kline field {} out of range", i)),
            _ => Err(anyhow::anyhow!("kline field {} is not numeric", i)),
        }
    };

    Ok(PriceBar::new(timestamp, num(1)?, num(2)?, num(3)?, num(4)?, num(5)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kline() {
        let row = json!([1700000000000i64, "100.5", "101.0", "99.5", "100.8", "1234.5", 1700003599999i64]);
        let bar = parse_kline(&row).unwrap();
        assert_eq!(bar.timestamp, 1700000000000);
        assert_eq!(bar.open, 100.5);
        assert_eq!(bar.close, 100.8);
        assert_eq!(bar.volume, 1234.5);
    }

    #[test]
    fn test_parse_kline_rejects_short_rows() {
        assert!(parse_kline(&json!([1, "1", "2"])).is_err());
        assert!(parse_kline(&json!({"open": 1})).is_err());
        assert!(parse_kline(&json!([1, "x", "2", "3", "4", "5"])).is_err());
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = BinanceClient::new("https://example.test/api/v3/", None);
        assert_eq!(client.base_url, "https://example.test/api/v3");
    }
}
