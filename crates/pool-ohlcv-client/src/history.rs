use chrono::{DateTime, Utc};
use pool_ohlcv_core::series::CandleSeries;
use pool_ohlcv_core::target::RequestTarget;
use tracing::debug;

use crate::error::ClientError;
use crate::source::{CandleSource, MAX_PAGE_SIZE, PageQuery};

/// Pages requested by a history fetch when the caller has no preference.
pub const DEFAULT_HISTORY_CHUNKS: u32 = 3;

fn is_full(page: &CandleSeries) -> bool {
    page.len() >= MAX_PAGE_SIZE as usize
}

/// Fetch up to `chunks` pages and merge them.
///
/// Every iteration requests the same latest page; nothing shifts the window
/// backwards, so extra chunks only add duplicates. Use [`backfill`] to walk
/// further back in time. Stops after the first short page. Any failed page
/// fails the whole call.
pub async fn collect_history(
    source: &dyn CandleSource,
    target: &RequestTarget,
    chunks: u32,
) -> Result<CandleSeries, ClientError> {
    let query = PageQuery::latest(MAX_PAGE_SIZE);
    let mut pages = Vec::new();

    for chunk in 0..chunks {
        let page = source.page(target, &query).await?;
        debug!(
            "{}: {target}: chunk {}/{chunks}: {} candle(s)",
            source.name(),
            chunk + 1,
            page.len()
        );

        let full = is_full(&page);
        pages.push(page);
        if !full {
            break;
        }
    }

    CandleSeries::merge(pages).ok_or(ClientError::NoPages)
}

/// Walk backwards from the latest candle using `before_timestamp` as a cursor
/// until `since` is reached, history runs out, or `max_calls` requests were made.
///
/// Candles older than `since` are dropped. A failed request fails the whole call;
/// an empty page after the first one just marks the start of the pool's history.
pub async fn backfill(
    source: &dyn CandleSource,
    target: &RequestTarget,
    since: DateTime<Utc>,
    max_calls: u32,
) -> Result<CandleSeries, ClientError> {
    if max_calls == 0 {
        return Err(ClientError::NoPages);
    }

    let mut pages = Vec::new();
    let mut cursor: Option<DateTime<Utc>> = None;

    for call in 0..max_calls {
        let query = match cursor {
            Some(before) => PageQuery::before(before),
            None => PageQuery::latest(MAX_PAGE_SIZE),
        };

        let mut page = match source.page(target, &query).await {
            Ok(page) => page,
            Err(ClientError::Empty { .. }) if call > 0 => break,
            Err(e) => return Err(e),
        };

        debug!(
            "{}: {target}: call {}/{max_calls} before {:?}: {} candle(s)",
            source.name(),
            call + 1,
            cursor,
            page.len()
        );

        let full = is_full(&page);
        let oldest = page.oldest_timestamp();
        page.retain_since(since);
        if !page.is_empty() {
            pages.push(page);
        }

        let Some(oldest) = oldest else { break };
        if !full || oldest <= since {
            break;
        }
        if cursor.is_some_and(|before| oldest >= before) {
            debug!("{target}: cursor stuck at {oldest}, stopping");
            break;
        }
        cursor = Some(oldest);
    }

    CandleSeries::merge(pages).ok_or_else(|| ClientError::Empty {
        what: "OHLCV data",
        subject: format!("pool {} since {since}", target.pool_address),
    })
}
