use crate::scrapers::fingerprint::BrowserFingerprint;
use crate::scrapers::traits::PageRenderer;
use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a single page fetch amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Result markup with scripts and styles removed
    Markup(String),
    /// The site said there is nothing (more) to show
    Empty,
    /// Something went wrong; the cause has already been logged
    Failed,
}

/// Wraps a [`PageRenderer`] and turns its output into a [`FetchOutcome`]
pub struct PageFetcher {
    renderer: Arc<dyn PageRenderer>,
    no_results_markers: Vec<String>,
    script_or_style: Regex,
}

impl PageFetcher {
    pub fn new(renderer: Arc<dyn PageRenderer>, no_results_markers: Vec<String>) -> Result<Self> {
        let script_or_style = Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
            .context("Failed to compile script/style pattern")?;

        Ok(Self {
            renderer,
            no_results_markers,
            script_or_style,
        })
    }

    /// Wait out the fingerprint's delay, render `url` and classify the page.
    pub async fn fetch(&self, url: &Url, fingerprint: &BrowserFingerprint) -> FetchOutcome {
        debug!(
            "Fetching {} via {} (ua: {:.50}..., viewport {}x{}, tz {}, locale {})",
            url,
            self.renderer.backend_name(),
            fingerprint.user_agent,
            fingerprint.viewport.width,
            fingerprint.viewport.height,
            fingerprint.timezone,
            fingerprint.locale
        );

        tokio::time::sleep(fingerprint.delay).await;

        match self.renderer.render(url, fingerprint).await {
            Ok(content) => self.classify(&content),
            Err(e) => {
                warn!("Fetch failed for {}: {:#}", url, e);
                FetchOutcome::Failed
            }
        }
    }

    /// Classify already-rendered markup
    pub fn classify(&self, content: &str) -> FetchOutcome {
        if self
            .no_results_markers
            .iter()
            .any(|marker| content.contains(marker.as_str()))
        {
            return FetchOutcome::Empty;
        }

        FetchOutcome::Markup(self.script_or_style.replace_all(content, "").into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::fingerprint::random_fingerprint;
    use anyhow::bail;
    use async_trait::async_trait;

    struct Canned(Result<String, String>);

    #[async_trait]
    impl PageRenderer for Canned {
        async fn render(&self, _url: &Url, _fp: &BrowserFingerprint) -> Result<String> {
            match &self.0 {
                Ok(html) => Ok(html.clone()),
                Err(msg) => bail!("{msg}"),
            }
        }

        fn backend_name(&self) -> &'static str {
            "canned"
        }
    }

    fn fetcher(response: Result<String, String>) -> PageFetcher {
        PageFetcher::new(Arc::new(Canned(response)), vec!["Ni zadetkov".to_string()]).unwrap()
    }

    fn url() -> Url {
        Url::parse("https://example.test/Ads/results.asp").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn renderer_error_is_a_generic_failure() {
        let fetcher = fetcher(Err("navigation timeout".into()));
        let fp = random_fingerprint(&mut rand::rng());
        assert_eq!(fetcher.fetch(&url(), &fp).await, FetchOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn no_results_marker_is_empty_not_error() {
        let fetcher = fetcher(Ok("<html><body><p>Ni zadetkov</p></body></html>".into()));
        let fp = random_fingerprint(&mut rand::rng());
        assert_eq!(fetcher.fetch(&url(), &fp).await, FetchOutcome::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied_before_rendering() {
        let fetcher = fetcher(Ok("<div>ok</div>".into()));
        let fp = random_fingerprint(&mut rand::rng());
        let started = tokio::time::Instant::now();
        fetcher.fetch(&url(), &fp).await;
        assert!(started.elapsed() >= fp.delay);
    }

    #[test]
    fn scripts_and_styles_are_stripped() {
        let fetcher = fetcher(Ok(String::new()));
        let html = r#"<html><head><style type="text/css">.a{}</style><SCRIPT>var x = "</div>";
        </SCRIPT></head><body><div class="row">kept</div><script src="x.js"></script></body></html>"#;
        match fetcher.classify(html) {
            FetchOutcome::Markup(cleaned) => {
                assert!(cleaned.contains(r#"<div class="row">kept</div>"#));
                assert!(!cleaned.to_lowercase().contains("script"));
                assert!(!cleaned.contains("style"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
