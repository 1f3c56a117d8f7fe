pub mod candle;
pub mod error;
pub mod series;
pub mod target;
