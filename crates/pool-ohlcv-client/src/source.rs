use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pool_ohlcv_core::series::CandleSeries;
use pool_ohlcv_core::target::RequestTarget;

use crate::error::ClientError;

/// Largest page the OHLCV endpoint will return.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Parameters for a single OHLCV page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// Requested number of candles, clamped to [`MAX_PAGE_SIZE`] when sent.
    pub limit: u32,
    /// Only return candles before this instant (`before_timestamp`).
    pub before: Option<DateTime<Utc>>,
    /// Number of timeframe units per candle (`aggregate`).
    pub aggregate: Option<u32>,
}

impl PageQuery {
    /// The most recent `limit` candles.
    pub fn latest(limit: u32) -> Self {
        Self {
            limit,
            before: None,
            aggregate: None,
        }
    }

    /// A full page ending just before `before`.
    pub fn before(before: DateTime<Utc>) -> Self {
        Self {
            limit: MAX_PAGE_SIZE,
            before: Some(before),
            aggregate: None,
        }
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.min(MAX_PAGE_SIZE)
    }

    /// Query string pairs, in the order they are sent.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.effective_limit().to_string())];
        if let Some(before) = self.before {
            params.push(("before_timestamp", before.timestamp().to_string()));
        }
        if let Some(aggregate) = self.aggregate {
            params.push(("aggregate", aggregate.to_string()));
        }
        params
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::latest(MAX_PAGE_SIZE)
    }
}

/// Something that can serve one page of candles for a target.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Source name (for logging/display).
    fn name(&self) -> &str;

    /// Fetch a single page. An empty page is reported as [`ClientError::Empty`].
    async fn page(
        &self,
        target: &RequestTarget,
        query: &PageQuery,
    ) -> Result<CandleSeries, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(PageQuery::latest(5000).effective_limit(), 1000);
        assert_eq!(PageQuery::latest(250).effective_limit(), 250);
        assert_eq!(
            PageQuery::latest(5000).params(),
            vec![("limit", "1000".to_string())]
        );
    }

    #[test]
    fn optional_params_only_when_set() {
        let before = Utc.with_ymd_and_hms(2024, 2, 17, 0, 0, 0).unwrap();
        let query = PageQuery {
            aggregate: Some(4),
            ..PageQuery::before(before)
        };
        assert_eq!(
            query.params(),
            vec![
                ("limit", "1000".to_string()),
                ("before_timestamp", "1708128000".to_string()),
                ("aggregate", "4".to_string()),
            ]
        );
    }
}
