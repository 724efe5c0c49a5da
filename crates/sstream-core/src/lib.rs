pub mod config;
pub mod error;
pub mod types;

pub use config::{LogConfig, SstreamConfig, StreamConfig};
pub use error::{SstreamError, SstreamResult};
pub use types::Variant;
