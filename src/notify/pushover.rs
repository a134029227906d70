use crate::models::{Listing, NotifyCredentials};
use crate::notify::{ListingMessage, NotificationSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

/// Sends announcements through the Pushover messages API
pub struct PushoverSink {
    client: Client,
    endpoint: String,
    sound: String,
    priority: i8,
}

impl PushoverSink {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            sound: "pushover".to_string(),
            priority: 0,
        })
    }

    async fn post(&self, listing: &Listing, credentials: &NotifyCredentials) -> Result<()> {
        let message = ListingMessage::from(listing);
        let priority = self.priority.to_string();
        let form = [
            ("token", credentials.api_token.as_str()),
            ("user", credentials.user_key.as_str()),
            ("title", message.title.as_str()),
            ("message", message.body.as_str()),
            ("sound", self.sound.as_str()),
            ("priority", priority.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .context("Failed to reach Pushover")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Pushover returned {status}: {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for PushoverSink {
    async fn deliver(&self, listing: &Listing, credentials: &NotifyCredentials) -> bool {
        match self.post(listing, credentials).await {
            Ok(()) => {
                info!("Pushover notification sent for listing {}", listing.short_id());
                true
            }
            Err(e) => {
                warn!("Pushover notification failed for {}: {:#}", listing.short_id(), e);
                false
            }
        }
    }
}
