use crate::scrapers::fingerprint::BrowserFingerprint;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;

/// Loads a page in a real browser and hands back its markup.
///
/// Implementations report every failure (navigation timeout, selector wait,
/// crashed browser) as an error; classification happens in the fetcher.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &Url, fingerprint: &BrowserFingerprint) -> Result<String>;

    /// Name of the rendering backend, for logs
    fn backend_name(&self) -> &'static str;
}
