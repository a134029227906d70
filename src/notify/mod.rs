pub mod pushover;

pub use pushover::PushoverSink;

use crate::models::{Listing, NotifyCredentials};
use async_trait::async_trait;
use tracing::info;

/// Outbound channel for new-listing announcements
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one listing. `false` means it did not go out; callers carry on.
    async fn deliver(&self, listing: &Listing, credentials: &NotifyCredentials) -> bool;
}

/// Human-readable rendering of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListingMessage {
    pub title: String,
    pub body: String,
}

fn or_na(value: &Option<String>) -> &str {
    value.as_deref().filter(|v| !v.is_empty()).unwrap_or("N/A")
}

impl From<&Listing> for ListingMessage {
    fn from(listing: &Listing) -> Self {
        let mut body = format!(
            "💰 {} €\n📅 {}\n🛣️ {}\n🔧 {}\n",
            or_na(&listing.price),
            or_na(&listing.registration),
            or_na(&listing.mileage),
            or_na(&listing.engine),
        );
        if let Some(owners) = listing.owners.as_deref().filter(|o| !o.is_empty()) {
            body.push_str(&format!("👤 Lastnikov: {owners}\n"));
        }
        body.push_str(&format!("🔗 {}", or_na(&listing.url)));

        Self {
            title: format!("🚗 {}", or_na(&listing.title)),
            body,
        }
    }
}

/// Writes announcements to the log instead of sending them
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, listing: &Listing, _credentials: &NotifyCredentials) -> bool {
        let message = ListingMessage::from(listing);
        info!("[dry run] {} | {}", message.title, message.body.replace('\n', " | "));
        true
    }
}
