pub mod json;

pub use json::JsonFileStore;

use crate::models::{Listing, Subscriber};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unknown subscriber `{0}`")]
    UnknownSubscriber(String),
}

/// Persistence the cycle engine needs
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// All subscribers not soft-deleted
    async fn list_active(&self) -> Result<Vec<Subscriber>, StoreError>;

    /// Last persisted result set; `None` if there has never been one or it was cleared
    async fn baseline(&self, subscriber_id: &str) -> Result<Option<Vec<Listing>>, StoreError>;

    /// Replace the whole baseline
    async fn replace_baseline(
        &self,
        subscriber_id: &str,
        listings: &[Listing],
    ) -> Result<(), StoreError>;

    async fn clear_announce_flag(&self, subscriber_id: &str) -> Result<(), StoreError>;
}
