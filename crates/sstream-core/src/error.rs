use thiserror::Error;

pub type SstreamResult<T> = Result<T, SstreamError>;

#[derive(Debug, Error)]
pub enum SstreamError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
