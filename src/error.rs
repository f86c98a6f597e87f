use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Something went wrong: {0}")]
    Failed(String),
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
    #[error("Unknown metric tag: {0}")]
    UnknownMetric(u32),
    #[error("Unknown stable distribution tag: {0}")]
    UnknownDistribution(u32),
    #[error("Not implemented")]
    NotImplemented,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
