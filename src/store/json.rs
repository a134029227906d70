use crate::models::{Listing, NotifyCredentials, Subscriber};
use crate::scrapers::types::FilterSet;
use crate::store::{StoreError, SubscriberStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    subscribers: BTreeMap<String, Subscriber>,
    #[serde(default)]
    baselines: BTreeMap<String, Vec<Listing>>,
}

/// Subscriber store kept in a single JSON file.
///
/// The whole state is held in memory and rewritten after every change
/// (temp file + rename, so a crash never leaves a half-written file).
/// Changes are made on a copy and adopted only once the write succeeded,
/// so memory never runs ahead of the file.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<State>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist yet
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state at {}, starting empty", path.display());
                State::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &State) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    /// Register a subscriber or update an existing one.
    ///
    /// Changed filters drop the stored baseline and arm the announce flag so
    /// the first scrape under the new filters is reported in full. Updating
    /// also reactivates a deactivated subscriber.
    pub async fn upsert_subscriber(
        &self,
        id: &str,
        credentials: NotifyCredentials,
        filters: FilterSet,
        announce_next_baseline: bool,
    ) -> Result<Subscriber, StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();

        let subscriber = match next.subscribers.get(id).cloned() {
            Some(mut existing) => {
                let filters_changed = existing.filters != filters;
                existing.credentials = credentials;
                existing.filters = filters;
                existing.announce_next_baseline = announce_next_baseline || filters_changed;
                existing.active = true;
                existing.updated_at = Utc::now();

                if filters_changed {
                    info!("Filters changed for {}: clearing baseline, next scrape will be announced", id);
                    next.baselines.remove(id);
                }
                existing
            }
            None => {
                let mut subscriber = Subscriber::new(id, credentials, filters);
                subscriber.announce_next_baseline = announce_next_baseline;
                info!("Registered subscriber {}", id);
                subscriber
            }
        };

        next.subscribers.insert(id.to_string(), subscriber.clone());
        self.persist(&next).await?;
        *state = next;
        Ok(subscriber)
    }

    /// Soft-delete: the subscriber stops being scraped, their baseline stays
    pub async fn deactivate(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let subscriber = next
            .subscribers
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownSubscriber(id.to_string()))?;
        subscriber.active = false;
        subscriber.updated_at = Utc::now();
        self.persist(&next).await?;
        *state = next;
        info!("Deactivated subscriber {}", id);
        Ok(())
    }

    pub async fn subscriber(&self, id: &str) -> Option<Subscriber> {
        self.state.lock().await.subscribers.get(id).cloned()
    }
}

#[async_trait]
impl SubscriberStore for JsonFileStore {
    async fn list_active(&self) -> Result<Vec<Subscriber>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .subscribers
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect())
    }

    async fn baseline(&self, subscriber_id: &str) -> Result<Option<Vec<Listing>>, StoreError> {
        Ok(self.state.lock().await.baselines.get(subscriber_id).cloned())
    }

    async fn replace_baseline(
        &self,
        subscriber_id: &str,
        listings: &[Listing],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.subscribers.contains_key(subscriber_id) {
            return Err(StoreError::UnknownSubscriber(subscriber_id.to_string()));
        }
        let mut next = state.clone();
        next.baselines
            .insert(subscriber_id.to_string(), listings.to_vec());
        self.persist(&next).await?;
        *state = next;
        info!("Saved {} results for {}", listings.len(), subscriber_id);
        Ok(())
    }

    async fn clear_announce_flag(&self, subscriber_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let subscriber = next
            .subscribers
            .get_mut(subscriber_id)
            .ok_or_else(|| StoreError::UnknownSubscriber(subscriber_id.to_string()))?;
        subscriber.announce_next_baseline = false;
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }
}
