use crate::config::ScrapeLimits;
use crate::models::Listing;
use crate::scrapers::fetcher::{FetchOutcome, PageFetcher};
use crate::scrapers::fingerprint::random_fingerprint;
use crate::scrapers::listing::ListingExtractor;
use crate::scrapers::query::translate;
use crate::scrapers::types::FilterSet;
use anyhow::Result;
use tracing::{debug, info, warn};

/// Everything needed to walk result pages for one subscriber
pub struct Paginator<'a> {
    pub fetcher: &'a PageFetcher,
    pub extractor: &'a ListingExtractor,
    pub limits: &'a ScrapeLimits,
    pub origin: &'a str,
}

impl Paginator<'_> {
    /// Walk the result pages of one brand.
    ///
    /// Failed pages are skipped, an empty page ends the walk, and so does a
    /// page with fewer rows than the site shows per page.
    pub async fn scrape_brand(&self, filters: &FilterSet, brand: &str) -> Result<Vec<Listing>> {
        let label = if brand.is_empty() { "ALL" } else { brand };
        info!("Scraping brand '{}' (up to {} pages)", label, self.limits.max_pages);

        let mut query = translate(filters, brand)?;
        let mut listings = Vec::new();

        for page in 1..=self.limits.max_pages {
            query.set_page(page);
            let url = query.to_url(self.origin)?;
            let fingerprint = random_fingerprint(&mut rand::rng());

            debug!("Fetching page {} for '{}'", page, label);
            let markup = match self.fetcher.fetch(&url, &fingerprint).await {
                FetchOutcome::Markup(markup) => markup,
                FetchOutcome::Empty => {
                    debug!("No results on page {} for '{}'", page, label);
                    break;
                }
                FetchOutcome::Failed => {
                    warn!("Skipping page {} for '{}' after a failed fetch", page, label);
                    continue;
                }
            };

            let found = self.extractor.extract(&markup);
            let count = found.len();
            listings.extend(found);

            if count < self.limits.max_results_per_page {
                debug!(
                    "{} results on page {} (< {}), assuming last page",
                    count, page, self.limits.max_results_per_page
                );
                break;
            }
        }

        info!("Brand '{}' yielded {} listings", label, listings.len());
        Ok(listings)
    }

    /// Scrape every (normalized) brand of a filter set, concatenated in brand order
    pub async fn scrape_subscriber(&self, filters: &FilterSet) -> Result<Vec<Listing>> {
        let mut all = Vec::new();
        for brand in filters.normalized_brands(self.limits.max_brands) {
            all.extend(self.scrape_brand(filters, &brand).await?);
        }
        Ok(all)
    }
}
