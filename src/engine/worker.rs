use crate::config::{Config, Schedule, ScrapeLimits};
use crate::engine::diff::reconcile;
use crate::error::EngineError;
use crate::models::{Listing, NotifyCredentials, Subscriber};
use crate::notify::NotificationSink;
use crate::scrapers::fetcher::PageFetcher;
use crate::scrapers::listing::ListingExtractor;
use crate::scrapers::pagination::Paginator;
use crate::scrapers::traits::PageRenderer;
use crate::store::SubscriberStore;
use anyhow::Result;
use chrono::{Local, Timelike};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Where a cycle, or one subscriber within it, currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    FetchActiveSubscribers,
    FilterNontrivial,
    Scrape,
    Diff,
    Notify,
    Persist,
    CycleComplete,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchActiveSubscribers => "fetch-active-subscribers",
            Self::FilterNontrivial => "filter-nontrivial",
            Self::Scrape => "scrape",
            Self::Diff => "diff",
            Self::Notify => "notify",
            Self::Persist => "persist",
            Self::CycleComplete => "cycle-complete",
        };
        f.write_str(name)
    }
}

/// Result of processing one subscriber
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberOutcome {
    pub scraped: usize,
    pub announced: usize,
    pub delivered: usize,
    pub undelivered: usize,
}

/// Summary of one pass over the subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub active: usize,
    pub eligible: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub delivered: usize,
    pub undelivered: usize,
    /// A stop was requested before every eligible subscriber was processed
    pub interrupted: bool,
}

/// Drives scrape → diff → notify → persist for every subscriber, forever
pub struct Worker {
    store: Arc<dyn SubscriberStore>,
    sink: Arc<dyn NotificationSink>,
    fetcher: PageFetcher,
    extractor: ListingExtractor,
    limits: ScrapeLimits,
    schedule: Schedule,
    origin: String,
    notify_spacing: Duration,
}

impl Worker {
    pub fn new(
        config: &Config,
        renderer: Arc<dyn PageRenderer>,
        store: Arc<dyn SubscriberStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        Ok(Self {
            store,
            sink,
            fetcher: PageFetcher::new(renderer, config.no_results_markers.clone())?,
            extractor: ListingExtractor::new(&config.selectors, &config.site_origin)?,
            limits: config.limits.clone(),
            schedule: config.schedule.clone(),
            origin: config.site_origin.clone(),
            notify_spacing: config.notify_spacing,
        })
    }

    /// Run cycles until `stop` is cancelled.
    ///
    /// A stop request lets the subscriber in progress finish first.
    pub async fn run(&self, stop: CancellationToken) {
        info!(
            "Worker started: interval {}s, night interval {}s",
            self.schedule.interval.as_secs(),
            self.schedule.night_interval.as_secs()
        );

        while !stop.is_cancelled() {
            let started = Instant::now();
            let report = self.run_cycle(&stop).await;
            debug!("Cycle took {:.2}s: {:?}", started.elapsed().as_secs_f64(), report);

            let delay = self
                .schedule
                .jittered_delay(Local::now().hour(), &mut rand::rng());
            debug!("Waiting {}s until next cycle...", delay.as_secs());
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Worker stopped");
    }

    /// One pass over all eligible subscribers. Never fails as a whole.
    pub async fn run_cycle(&self, stop: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();

        let mut phase = CyclePhase::FetchActiveSubscribers;
        let subscribers = match self.store.list_active().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                error!("Cycle aborted during {}: {}", phase, e);
                return report;
            }
        };
        report.active = subscribers.len();

        phase = CyclePhase::FilterNontrivial;
        let eligible: Vec<Subscriber> = subscribers
            .into_iter()
            .filter(|s| {
                let restrictive = s.filters.is_restrictive();
                if !restrictive {
                    debug!("Skipping {}: no filters configured", s.id);
                }
                restrictive
            })
            .collect();
        report.eligible = eligible.len();
        debug!("{} of {} active subscribers after {}", report.eligible, report.active, phase);

        if eligible.is_empty() {
            debug!("No subscribers with filters configured. Waiting for filters...");
            return report;
        }
        info!("Starting scraping cycle for {} subscriber(s)", eligible.len());

        for subscriber in &eligible {
            if stop.is_cancelled() {
                info!("Stop requested, ending cycle before {}", subscriber.id);
                report.interrupted = true;
                break;
            }

            let mut phase = CyclePhase::Scrape;
            match self.process_subscriber(subscriber, &mut phase).await {
                Ok(outcome) => {
                    report.succeeded += 1;
                    report.delivered += outcome.delivered;
                    report.undelivered += outcome.undelivered;
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        subscriber = %subscriber.id,
                        phase = %phase,
                        error = %format!("{e:#}"),
                        "Failed to process subscriber"
                    );
                }
            }
        }

        info!(
            "Scraping cycle completed ({}): {} ok, {} failed, {} notifications sent",
            CyclePhase::CycleComplete,
            report.succeeded,
            report.failed,
            report.delivered
        );
        report
    }

    /// Scrape, diff, notify and persist for one subscriber.
    ///
    /// `phase` is left at the step that failed.
    pub async fn process_subscriber(
        &self,
        subscriber: &Subscriber,
        phase: &mut CyclePhase,
    ) -> Result<SubscriberOutcome, EngineError> {
        let id = subscriber.id.as_str();
        info!("Processing subscriber: {}", id);

        *phase = CyclePhase::Scrape;
        let paginator = Paginator {
            fetcher: &self.fetcher,
            extractor: &self.extractor,
            limits: &self.limits,
            origin: &self.origin,
        };
        let batch = paginator.scrape_subscriber(&subscriber.filters).await?;
        let scraped = batch.len();

        *phase = CyclePhase::Diff;
        let baseline = self.store.baseline(id).await?;
        let reconciliation = reconcile(
            baseline.as_deref(),
            batch,
            subscriber.announce_next_baseline,
        );

        if scraped == 0 {
            info!("No listings found for {}; filters may be too restrictive", id);
        } else if reconciliation.first_population {
            info!(
                "Initial scrape for {}: {} listings, {}",
                id,
                reconciliation.baseline.len(),
                if reconciliation.clear_announce_flag { "announcing all" } else { "not announcing" }
            );
        } else {
            info!(
                "Found {} NEW listings for {} (out of {})",
                reconciliation.to_notify.len(),
                id,
                reconciliation.baseline.len()
            );
        }

        *phase = CyclePhase::Notify;
        let (delivered, undelivered) = self
            .dispatch(&reconciliation.to_notify, &subscriber.credentials)
            .await;

        *phase = CyclePhase::Persist;
        self.store.replace_baseline(id, &reconciliation.baseline).await?;
        if reconciliation.clear_announce_flag {
            self.store.clear_announce_flag(id).await?;
            info!("Cleared announce flag for {}", id);
        }

        Ok(SubscriberOutcome {
            scraped,
            announced: reconciliation.to_notify.len(),
            delivered,
            undelivered,
        })
    }

    /// Deliver each listing, pausing between sends. Returns (delivered, failed).
    async fn dispatch(&self, listings: &[Listing], credentials: &NotifyCredentials) -> (usize, usize) {
        let mut delivered = 0;
        for (i, listing) in listings.iter().enumerate() {
            if i > 0 && !self.notify_spacing.is_zero() {
                tokio::time::sleep(self.notify_spacing).await;
            }
            if self.sink.deliver(listing, credentials).await {
                delivered += 1;
            }
        }

        if !listings.is_empty() {
            info!("Sent {}/{} notifications", delivered, listings.len());
        }
        (delivered, listings.len() - delivered)
    }
}
