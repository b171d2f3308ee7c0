use thiserror::Error;

/// A failure writing a log line or a maplog capture record. Callers treat
/// this as fatal to the owning session's log sink, per the specification's
/// error taxonomy; it never interrupts packet forwarding.
#[derive(Debug, Error)]
pub enum LogError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Region(#[from] mcrelay_region::RegionError),
}

pub type Result<T> = std::result::Result<T, LogError>;
