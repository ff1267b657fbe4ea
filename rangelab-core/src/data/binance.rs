//! Binance spot kline feed.
//!
//! Fetches klines from the `/api/v3/klines` REST endpoint. Each kline is a
//! 12-element JSON array with prices and volumes encoded as strings; error
//! payloads are objects carrying `code` and `msg`. No retries here — the
//! caller decides whether a failure aborts the run (historical) or waits for
//! the next poll tick (live).

use std::time::Duration;

use serde::Deserialize;

use super::provider::{BarFeed, FeedError};
use crate::domain::Bar;

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// One kline row as Binance serializes it:
/// `[openTime, open, high, low, close, volume, closeTime, quoteAssetVolume,
///   numberOfTrades, takerBuyBase, takerBuyQuote, ignore]`.
type KlineRow = (
    i64,    // open time
    String, // open
    String, // high
    String, // low
    String, // close
    String, // volume
    i64,    // close time
    String, // quote asset volume
    i64,    // number of trades
    String, // taker buy base asset volume
    String, // taker buy quote asset volume
    String, // ignore
);

/// The klines endpoint answers either rows or an error object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KlinesResponse {
    Error { code: i64, msg: String },
    Rows(Vec<KlineRow>),
}

/// Binance REST kline provider.
pub struct BinanceFeed {
    client: reqwest::blocking::Client,
    base_url: String,
    interval: String,
}

impl BinanceFeed {
    /// `interval` is the Binance interval label matching the configured bar
    /// step, e.g. `"1m"`, `"5m"`, `"1h"`.
    pub fn new(interval: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, interval)
    }

    /// Point the feed at a non-default host (testnet, local stub).
    pub fn with_base_url(base_url: impl Into<String>, interval: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            interval: interval.into(),
        }
    }

    fn parse_response(resp: KlinesResponse) -> Result<Vec<Bar>, FeedError> {
        match resp {
            KlinesResponse::Error { code, msg } => Err(FeedError::Provider {
                message: format!("{msg} (code {code})"),
            }),
            KlinesResponse::Rows(rows) => rows.into_iter().map(row_to_bar).collect(),
        }
    }
}

fn parse_price(field: &str, value: &str) -> Result<f64, FeedError> {
    value
        .parse::<f64>()
        .map_err(|e| FeedError::Parse(format!("bad {field} '{value}': {e}")))
}

fn row_to_bar(row: KlineRow) -> Result<Bar, FeedError> {
    let (
        open_time,
        open,
        high,
        low,
        close,
        volume,
        close_time,
        quote_volume,
        trade_count,
        taker_base,
        taker_quote,
        _ignore,
    ) = row;
    Ok(Bar {
        open_time,
        open: parse_price("open", &open)?,
        high: parse_price("high", &high)?,
        low: parse_price("low", &low)?,
        close: parse_price("close", &close)?,
        volume: parse_price("volume", &volume)?,
        close_time,
        quote_volume: parse_price("quote_volume", &quote_volume)?,
        trade_count,
        taker_buy_base_volume: parse_price("taker_buy_base_volume", &taker_base)?,
        taker_buy_quote_volume: parse_price("taker_buy_quote_volume", &taker_quote)?,
    })
}

impl BarFeed for BinanceFeed {
    fn name(&self) -> &str {
        "binance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<Bar>, FeedError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let start = start_ms.to_string();
        let end = end_ms.to_string();
        let limit = limit.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", self.interval.as_str()),
                ("startTime", start.as_str()),
                ("endTime", end.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .map_err(|e| FeedError::Http(e.to_string()))?;

        // Binance reports request errors (bad symbol, rate limit) as JSON
        // bodies with a non-2xx status; decode the body either way so the
        // provider's message survives.
        let body = resp.text().map_err(|e| FeedError::Http(e.to_string()))?;
        let decoded: KlinesResponse = serde_json::from_str(&body)
            .map_err(|e| FeedError::Parse(format!("unexpected klines payload: {e}")))?;
        Self::parse_response(decoded)
    }
}
