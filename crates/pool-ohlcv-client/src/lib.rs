pub mod error;
pub mod gecko;
pub mod history;
pub mod pools;
pub mod source;
