use crate::config::Config;
use crate::scrapers::fingerprint::BrowserFingerprint;
use crate::scrapers::traits::PageRenderer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::{Browser, LaunchOptions};
use reqwest::Url;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::time::Duration;
use tracing::{debug, info};

/// Renders result pages with headless Chrome.
///
/// A fresh browser is launched for every page so that no cookies or
/// fingerprint carry over between fetches.
#[derive(Debug, Clone)]
pub struct HeadlessChromeRenderer {
    navigation_timeout: Duration,
    selector_timeout: Duration,
    result_row_selector: String,
    no_results_markers: Vec<String>,
}

impl HeadlessChromeRenderer {
    pub fn new(config: &Config) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout,
            selector_timeout: config.selector_timeout,
            result_row_selector: config.selectors.result_row.clone(),
            no_results_markers: config.no_results_markers.clone(),
        }
    }

    fn render_blocking(&self, url: &str, fingerprint: &BrowserFingerprint) -> Result<String> {
        let lang_arg = format!("--lang={}", fingerprint.locale);
        let args = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--no-sandbox"),
            OsStr::new(&lang_arg),
        ];

        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((fingerprint.viewport.width, fingerprint.viewport.height)))
            .args(args)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open tab")?;
        tab.set_default_timeout(self.navigation_timeout);

        tab.set_user_agent(
            &fingerprint.user_agent,
            Some(&fingerprint.accept_language),
            None,
        )
        .context("Failed to override user agent")?;
        tab.set_extra_http_headers(HashMap::from([("DNT", "1")]))
            .context("Failed to set request headers")?;
        tab.call_method(Emulation::SetTimezoneOverride {
            timezone_id: fingerprint.timezone.clone(),
        })
        .context("Failed to override timezone")?;

        tab.navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .with_context(|| format!("Navigation to {url} failed"))?;

        // No-results pages never grow result rows, so a timed-out wait is only
        // a failure when the page does not say it is empty.
        if let Err(e) = tab.wait_for_element_with_custom_timeout(
            &self.result_row_selector,
            self.selector_timeout,
        ) {
            let content = tab.get_content().context("Failed to read page content")?;
            if self
                .no_results_markers
                .iter()
                .any(|marker| content.contains(marker.as_str()))
            {
                debug!("No result rows on {url}, page reports no results");
                return Ok(content);
            }
            return Err(e).context(format!(
                "Result rows ({}) never appeared",
                self.result_row_selector
            ));
        }

        let content = tab.get_content().context("Failed to read page content")?;
        info!("Rendered {} ({} bytes)", url, content.len());
        Ok(content)
    }
}

#[async_trait]
impl PageRenderer for HeadlessChromeRenderer {
    async fn render(&self, url: &Url, fingerprint: &BrowserFingerprint) -> Result<String> {
        let renderer = self.clone();
        let url = url.to_string();
        let fingerprint = fingerprint.clone();

        tokio::task::spawn_blocking(move || renderer.render_blocking(&url, &fingerprint))
            .await
            .context("Browser task panicked")?
    }

    fn backend_name(&self) -> &'static str {
        "headless-chrome"
    }
}
