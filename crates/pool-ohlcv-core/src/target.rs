use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OhlcvError;

/// Candle interval granularity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Minute,
    #[default]
    Hour,
    Day,
}

impl Timeframe {
    /// Path segment used by the OHLCV endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute => "minute",
            Timeframe::Hour => "hour",
            Timeframe::Day => "day",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = OhlcvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minute" => Ok(Timeframe::Minute),
            "hour" => Ok(Timeframe::Hour),
            "day" => Ok(Timeframe::Day),
            _ => Err(OhlcvError::UnknownTimeframe(s.to_string())),
        }
    }
}

/// Identifies what a fetch is scoped to: one pool on one network at one timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestTarget {
    pub network: String,
    pub pool_address: String,
    pub timeframe: Timeframe,
}

impl RequestTarget {
    pub fn new(
        network: impl Into<String>,
        pool_address: impl Into<String>,
        timeframe: Timeframe,
    ) -> Self {
        Self {
            network: network.into(),
            pool_address: pool_address.into(),
            timeframe,
        }
    }

    /// Target at the default (hourly) timeframe.
    pub fn hourly(network: impl Into<String>, pool_address: impl Into<String>) -> Self {
        Self::new(network, pool_address, Timeframe::default())
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.network, self.pool_address, self.timeframe)
    }
}

/// Map a friendly network name to the API's network identifier.
/// Unknown names pass through lowercased.
pub fn network_id(alias: &str) -> String {
    let alias = alias.trim().to_lowercase();
    match alias.as_str() {
        "ethereum" | "eth" => "eth".to_string(),
        "base" => "base".to_string(),
        "solana" | "sol" => "solana".to_string(),
        _ => alias,
    }
}
