use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pool_ohlcv_core::candle::Candle;
use pool_ohlcv_core::series::CandleSeries;
use pool_ohlcv_core::target::RequestTarget;
use reqwest::Client;
use reqwest::header::ACCEPT;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientError, report};
use crate::history;
use crate::source::{CandleSource, MAX_PAGE_SIZE, PageQuery};

pub const GECKO_TERMINAL_BASE_URL: &str = "https://api.geckoterminal.com/api/v2";

/// Page size requested when the caller has no preference.
pub const DEFAULT_PAGE_LIMIT: u32 = MAX_PAGE_SIZE;

/// Connection settings for [`GeckoTerminalClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: Option<String>,
    /// Whole-request timeout. `None` leaves reqwest's default (no timeout).
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: GECKO_TERMINAL_BASE_URL.to_string(),
            user_agent: None,
            timeout: None,
        }
    }
}

/// GeckoTerminal market data client.
/// No authentication required. One `reqwest::Client` is built up front and
/// reused for every request.
pub struct GeckoTerminalClient {
    client: Client,
    base_url: String,
}

impl GeckoTerminalClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: GECKO_TERMINAL_BASE_URL.to_string(),
        }
    }

    /// Create with a custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder();
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn ohlcv_url(&self, target: &RequestTarget) -> String {
        format!(
            "{}/networks/{}/pools/{}/ohlcv/{}",
            self.base_url, target.network, target.pool_address, target.timeframe
        )
    }

    /// GET `url` and decode a JSON body. Non-2xx responses become [`ClientError::Api`].
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, ClientError> {
        debug!("GET {url} {params:?}");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status,
                message: body,
            });
        }

        // Reading the body is transport; only decoding it is a parse failure.
        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| ClientError::Parse(format!("failed to parse response: {e}")))
    }

    /// Fetch one page of candles with explicit query parameters.
    pub async fn try_fetch_page_with(
        &self,
        target: &RequestTarget,
        query: &PageQuery,
    ) -> Result<CandleSeries, ClientError> {
        let body: OhlcvResponse = self
            .get_json(&self.ohlcv_url(target), &query.params())
            .await?;

        let rows = body.data.attributes.ohlcv_list.unwrap_or_default();
        if rows.is_empty() {
            return Err(ClientError::Empty {
                what: "OHLCV data",
                subject: format!("pool {}", target.pool_address),
            });
        }

        let candles = rows
            .iter()
            .enumerate()
            .map(|(i, row)| parse_ohlcv_row(row).map_err(|e| row_error(i, e)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CandleSeries::new(target.clone(), candles))
    }

    /// Fetch the latest `limit` candles (at most 1000).
    pub async fn try_fetch_page(
        &self,
        target: &RequestTarget,
        limit: u32,
    ) -> Result<CandleSeries, ClientError> {
        self.try_fetch_page_with(target, &PageQuery::latest(limit)).await
    }

    /// Fetch the latest `limit` candles (at most 1000).
    /// Failures are logged and reported as `None`.
    pub async fn fetch_page(&self, target: &RequestTarget, limit: u32) -> Option<CandleSeries> {
        self.try_fetch_page(target, limit)
            .await
            .inspect_err(report)
            .ok()
    }

    pub async fn fetch_page_with(
        &self,
        target: &RequestTarget,
        query: &PageQuery,
    ) -> Option<CandleSeries> {
        self.try_fetch_page_with(target, query)
            .await
            .inspect_err(report)
            .ok()
    }

    /// See [`history::collect_history`].
    pub async fn try_fetch_history(
        &self,
        target: &RequestTarget,
        chunks: u32,
    ) -> Result<CandleSeries, ClientError> {
        history::collect_history(self, target, chunks).await
    }

    /// Fetch up to `chunks` pages and merge them into one ascending series.
    /// Failures are logged and reported as `None`; no partial result is returned.
    pub async fn fetch_history(&self, target: &RequestTarget, chunks: u32) -> Option<CandleSeries> {
        self.try_fetch_history(target, chunks)
            .await
            .inspect_err(report)
            .ok()
    }

    /// See [`history::backfill`].
    pub async fn try_backfill(
        &self,
        target: &RequestTarget,
        since: DateTime<Utc>,
        max_calls: u32,
    ) -> Result<CandleSeries, ClientError> {
        history::backfill(self, target, since, max_calls).await
    }

    pub async fn backfill(
        &self,
        target: &RequestTarget,
        since: DateTime<Utc>,
        max_calls: u32,
    ) -> Option<CandleSeries> {
        self.try_backfill(target, since, max_calls)
            .await
            .inspect_err(report)
            .ok()
    }
}

impl Default for GeckoTerminalClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandleSource for GeckoTerminalClient {
    fn name(&self) -> &str {
        "geckoterminal"
    }

    async fn page(
        &self,
        target: &RequestTarget,
        query: &PageQuery,
    ) -> Result<CandleSeries, ClientError> {
        self.try_fetch_page_with(target, query).await
    }
}

#[derive(Debug, Deserialize)]
struct OhlcvResponse {
    data: OhlcvData,
}

#[derive(Debug, Deserialize)]
struct OhlcvData {
    attributes: OhlcvAttributes,
}

#[derive(Debug, Deserialize)]
struct OhlcvAttributes {
    /// Required key; an explicit `null` counts as an empty list.
    #[serde(deserialize_with = "Option::deserialize")]
    ohlcv_list: Option<Vec<Vec<Value>>>,
}

fn row_error(index: usize, err: ClientError) -> ClientError {
    match err {
        ClientError::Parse(msg) => ClientError::Parse(format!("row {index}: {msg}")),
        other => other,
    }
}

/// Map `[timestamp, open, high, low, close, volume]` positionally onto a candle.
fn parse_ohlcv_row(row: &[Value]) -> Result<Candle, ClientError> {
    let [timestamp, open, high, low, close, volume] = row else {
        return Err(ClientError::Parse(format!(
            "expected 6 fields, got {}",
            row.len()
        )));
    };

    Ok(Candle {
        timestamp: value_to_timestamp(timestamp)?,
        open: value_to_decimal(open, "open")?,
        high: value_to_decimal(high, "high")?,
        low: value_to_decimal(low, "low")?,
        close: value_to_decimal(close, "close")?,
        volume: value_to_decimal(volume, "volume")?,
    })
}

/// Seconds since the epoch, as an integer, an integral float, or a numeric string.
fn value_to_timestamp(value: &Value) -> Result<DateTime<Utc>, ClientError> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ClientError::Parse(format!("invalid timestamp: {value}")))?;

    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ClientError::Parse(format!("invalid unix timestamp: {secs}")))
}

/// Numbers go through their shortest decimal rendering, so `0.1` stays `0.1`.
fn value_to_decimal(value: &Value, field: &str) -> Result<Decimal, ClientError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(ClientError::Parse(format!("invalid {field}: {value}"))),
    };

    parse_decimal(&text)
        .map_err(|e| ClientError::Parse(format!("invalid {field} '{text}': {e}")))
}

/// Fractional digits a `Decimal` can carry.
const MAX_SCALE: u32 = 28;

/// Plain or scientific decimal text. Results needing more than 28 fractional
/// digits are rounded to 28; magnitudes above `Decimal::MAX` are rejected.
fn parse_decimal(text: &str) -> Result<Decimal, String> {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(pos) => {
            let exponent = text[pos + 1..]
                .parse::<i32>()
                .map_err(|e| format!("bad exponent: {e}"))?;
            (&text[..pos], exponent)
        }
        None => (text, 0),
    };

    let mut value = mantissa.parse::<Decimal>().map_err(|e| e.to_string())?;
    if value.is_zero() {
        return Ok(Decimal::ZERO);
    }

    if exponent >= 0 {
        for _ in 0..exponent {
            value = value
                .checked_mul(Decimal::TEN)
                .ok_or_else(|| "out of range for Decimal".to_string())?;
        }
        return Ok(value);
    }

    let shift = exponent.unsigned_abs();
    let scale = value.scale() + shift;
    if scale <= MAX_SCALE {
        value.set_scale(scale).map_err(|e| e.to_string())?;
        return Ok(value);
    }

    for _ in 0..shift {
        value /= Decimal::TEN;
        if value.is_zero() {
            break;
        }
    }
    Ok(value.round_dp(MAX_SCALE))
}
