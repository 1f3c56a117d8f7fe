use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candle::Candle;
use crate::target::RequestTarget;

/// Candles for a single (network, pool, timeframe) target.
///
/// A series straight from one API page keeps the order the API returned.
/// A merged series has unique timestamps sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleSeries {
    target: RequestTarget,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(target: RequestTarget, candles: Vec<Candle>) -> Self {
        Self { target, candles }
    }

    pub fn target(&self) -> &RequestTarget {
        &self.target
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    /// Earliest timestamp in the series, regardless of ordering.
    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.candles.iter().map(|c| c.timestamp).min()
    }

    /// Latest timestamp in the series, regardless of ordering.
    pub fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.candles.iter().map(|c| c.timestamp).max()
    }

    /// Look up the candle at an exact timestamp.
    pub fn get(&self, timestamp: DateTime<Utc>) -> Option<&Candle> {
        self.candles.iter().find(|c| c.timestamp == timestamp)
    }

    /// Drop candles strictly older than `since`.
    pub fn retain_since(&mut self, since: DateTime<Utc>) {
        self.candles.retain(|c| c.timestamp >= since);
    }

    /// Concatenate pages, keep the first candle seen for each timestamp,
    /// and sort ascending. Returns `None` when there are no pages.
    ///
    /// The merged series takes the target of the first page.
    pub fn merge(pages: impl IntoIterator<Item = CandleSeries>) -> Option<CandleSeries> {
        let mut pages = pages.into_iter();
        let first = pages.next()?;
        let target = first.target;

        let mut seen = HashSet::new();
        let mut candles = Vec::with_capacity(first.candles.len());
        for candle in first.candles.into_iter().chain(pages.flat_map(|p| p.candles)) {
            if seen.insert(candle.timestamp) {
                candles.push(candle);
            }
        }

        candles.sort_by_key(|c| c.timestamp);
        Some(CandleSeries { target, candles })
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}
