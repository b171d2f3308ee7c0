use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Region(#[from] mcrelay_region::RegionError),
}

pub type Result<T> = std::result::Result<T, MergeError>;
