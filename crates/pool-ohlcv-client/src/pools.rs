use chrono::{DateTime, Utc};
use pool_ohlcv_core::series::CandleSeries;
use pool_ohlcv_core::target::{RequestTarget, Timeframe};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ClientError, report};
use crate::gecko::GeckoTerminalClient;

/// A liquidity pool trading a token, as listed by the token pools endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    /// API identifier, `{network}_{address}`.
    pub id: String,
    pub address: String,
    pub name: Option<String>,
    pub base_token_price_usd: Option<Decimal>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    data: Vec<PoolResource>,
}

#[derive(Debug, Deserialize)]
struct PoolResource {
    id: String,
    #[serde(default)]
    attributes: PoolAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct PoolAttributes {
    address: Option<String>,
    name: Option<String>,
    base_token_price_usd: Option<String>,
    pool_created_at: Option<DateTime<Utc>>,
}

impl PoolResource {
    fn to_summary(&self, network: &str) -> Result<PoolSummary, ClientError> {
        let address = match &self.attributes.address {
            Some(address) => address.clone(),
            None => self
                .id
                .strip_prefix(&format!("{network}_"))
                .unwrap_or(self.id.as_str())
                .to_string(),
        };

        let base_token_price_usd = self
            .attributes
            .base_token_price_usd
            .as_deref()
            .map(|price| {
                price.parse::<Decimal>().map_err(|e| {
                    ClientError::Parse(format!("invalid base_token_price_usd '{price}': {e}"))
                })
            })
            .transpose()?;

        Ok(PoolSummary {
            id: self.id.clone(),
            address,
            name: self.attributes.name.clone(),
            base_token_price_usd,
            created_at: self.attributes.pool_created_at,
        })
    }
}

impl GeckoTerminalClient {
    /// List the pools trading `token_address` on `network`, in API order
    /// (the API ranks the most liquid pools first).
    pub async fn try_token_pools(
        &self,
        network: &str,
        token_address: &str,
    ) -> Result<Vec<PoolSummary>, ClientError> {
        let url = format!(
            "{}/networks/{}/tokens/{}/pools",
            self.base_url(),
            network,
            token_address
        );
        let body: PoolsResponse = self.get_json(&url, &[]).await?;

        if body.data.is_empty() {
            return Err(ClientError::Empty {
                what: "pools",
                subject: format!("token {token_address}"),
            });
        }

        body.data.iter().map(|pool| pool.to_summary(network)).collect()
    }

    /// Failures are logged and reported as `None`.
    pub async fn token_pools(
        &self,
        network: &str,
        token_address: &str,
    ) -> Option<Vec<PoolSummary>> {
        self.try_token_pools(network, token_address)
            .await
            .inspect_err(report)
            .ok()
    }

    /// Backfill the token's top pool. `since` is raised to the pool's
    /// creation time when that is later, so no calls go to empty history.
    pub async fn try_backfill_top_pool(
        &self,
        network: &str,
        token_address: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        max_calls: u32,
    ) -> Result<(PoolSummary, CandleSeries), ClientError> {
        let pools = self.try_token_pools(network, token_address).await?;
        let Some(pool) = pools.into_iter().next() else {
            return Err(ClientError::Empty {
                what: "pools",
                subject: format!("token {token_address}"),
            });
        };

        let since = match pool.created_at {
            Some(created_at) => since.max(created_at),
            None => since,
        };
        info!("Backfilling top pool {} for token {token_address} since {since}", pool.address);

        let target = RequestTarget::new(network, pool.address.as_str(), timeframe);
        let series = self.try_backfill(&target, since, max_calls).await?;
        Ok((pool, series))
    }

    /// Failures are logged and reported as `None`.
    pub async fn backfill_top_pool(
        &self,
        network: &str,
        token_address: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        max_calls: u32,
    ) -> Option<(PoolSummary, CandleSeries)> {
        self.try_backfill_top_pool(network, token_address, timeframe, since, max_calls)
            .await
            .inspect_err(report)
            .ok()
    }
}
