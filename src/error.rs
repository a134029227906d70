use crate::store::StoreError;
use thiserror::Error;

/// Why processing one subscriber failed
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Scrape(#[from] anyhow::Error),
}
