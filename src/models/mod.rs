use crate::scrapers::types::FilterSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// One scraped ad.
///
/// Every column is an explicit `Option` so that all records in a batch have
/// the same shape; a column the page did not carry is `None`, never dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub fingerprint: String,
    pub title: Option<String>,
    pub price: Option<String>,
    pub url: Option<String>,
    pub registration: Option<String>,
    pub mileage: Option<String>,
    pub transmission: Option<String>,
    pub engine: Option<String>,
    pub owners: Option<String>,
}

impl Listing {
    /// Short form of the fingerprint for log lines
    pub fn short_id(&self) -> &str {
        let end = self.fingerprint.len().min(8);
        &self.fingerprint[..end]
    }
}

/// Content identity of a listing: SHA-256 over title, normalized price and
/// registration date. Absent parts hash as empty strings.
pub fn listing_fingerprint(title: &str, price: &str, registration: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(price.as_bytes());
    hasher.update(b"|");
    hasher.update(registration.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Credentials for the notification transport. The engine never looks inside.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifyCredentials {
    pub api_token: String,
    pub user_key: String,
}

impl fmt::Debug for NotifyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyCredentials")
            .field("api_token", &"***")
            .field("user_key", &"***")
            .finish()
    }
}

/// A registered subscriber and their search criteria
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub credentials: NotifyCredentials,
    pub filters: FilterSet,
    /// Treat the next fresh baseline as notification-worthy (set on filter change)
    #[serde(default)]
    pub announce_next_baseline: bool,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Subscriber {
    pub fn new(id: impl Into<String>, credentials: NotifyCredentials, filters: FilterSet) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            credentials,
            filters,
            announce_next_baseline: false,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
