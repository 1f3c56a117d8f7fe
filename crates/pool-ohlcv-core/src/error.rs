use thiserror::Error;

#[derive(Debug, Error)]
pub enum OhlcvError {
    #[error("Unknown timeframe '{0}'. Expected: minute, hour, day")]
    UnknownTimeframe(String),
}
