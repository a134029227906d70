use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// CSS selectors describing the result page layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Selectors {
    pub result_row: String,
    pub title: String,
    pub price_main: String,
    pub price_fallback: String,
    pub link: String,
    pub data_block_primary: String,
    pub data_block_fallback: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            result_row: "div.GO-Results-Row".to_string(),
            title: "div.GO-Results-Naziv".to_string(),
            price_main: "div.GO-Results-Price-TXT-Regular".to_string(),
            price_fallback: "div.GO-Results-Price-TXT-AkcijaCena".to_string(),
            link: "a.stretched-link".to_string(),
            data_block_primary: "div.GO-Results-Data-Top".to_string(),
            data_block_fallback: "div.GO-Results-Data".to_string(),
        }
    }
}

/// Site facts and request budgets the engine depends on
#[derive(Debug, Clone)]
pub struct ScrapeLimits {
    pub max_pages: u32,
    pub max_brands: usize,
    /// A page with fewer rows than this is the last one
    pub max_results_per_page: usize,
}

impl Default for ScrapeLimits {
    fn default() -> Self {
        Self {
            max_pages: 1,
            max_brands: 2,
            max_results_per_page: 48,
        }
    }
}

/// Inter-cycle pacing
#[derive(Debug, Clone)]
pub struct Schedule {
    pub interval: Duration,
    pub night_interval: Duration,
    /// Local hour the night window starts (inclusive)
    pub night_start_hour: u32,
    /// Local hour the night window ends (exclusive)
    pub night_end_hour: u32,
    /// Upper bound of the random extra wait added to daytime cycles
    pub jitter: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            night_interval: Duration::from_secs(3600),
            night_start_hour: 0,
            night_end_hour: 6,
            jitter: Duration::ZERO,
        }
    }
}

impl Schedule {
    pub fn is_night(&self, hour: u32) -> bool {
        if self.night_start_hour <= self.night_end_hour {
            hour >= self.night_start_hour && hour < self.night_end_hour
        } else {
            // window wraps midnight, e.g. 22..6
            hour >= self.night_start_hour || hour < self.night_end_hour
        }
    }

    /// Sleep between cycles for the given local hour
    pub fn delay_for_hour(&self, hour: u32) -> Duration {
        if self.is_night(hour) {
            self.night_interval.max(self.interval)
        } else {
            self.interval
        }
    }

    /// [`Self::delay_for_hour`] plus up to `jitter` extra during the day
    pub fn jittered_delay<R: Rng + ?Sized>(&self, hour: u32, rng: &mut R) -> Duration {
        let base = self.delay_for_hour(hour);
        if self.is_night(hour) || self.jitter.is_zero() {
            return base;
        }
        base + Duration::from_millis(rng.random_range(0..=self.jitter.as_millis() as u64))
    }
}

/// Application configuration, read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub state_path: PathBuf,
    pub site_origin: String,
    pub limits: ScrapeLimits,
    pub schedule: Schedule,
    pub selectors: Selectors,
    /// Markers the site prints instead of results
    pub no_results_markers: Vec<String>,
    pub notify_spacing: Duration,
    pub notify_dry_run: bool,
    pub pushover_url: String,
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("data/state.json"),
            site_origin: "https://www.avto.net".to_string(),
            limits: ScrapeLimits::default(),
            schedule: Schedule::default(),
            selectors: Selectors::default(),
            no_results_markers: vec!["Ni zadetkov".to_string(), "ni rezultatov".to_string()],
            notify_spacing: Duration::from_millis(500),
            notify_dry_run: false,
            pushover_url: "https://api.pushover.net/1/messages.json".to_string(),
            navigation_timeout: Duration::from_secs(60),
            selector_timeout: Duration::from_secs(15),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let min_interval = Duration::from_secs(var_or("MIN_SCRAPE_INTERVAL_SECS", 60)?);
        let interval = Duration::from_secs(var_or(
            "SCRAPE_INTERVAL_SECS",
            defaults.schedule.interval.as_secs(),
        )?);
        if interval < min_interval {
            bail!(
                "SCRAPE_INTERVAL_SECS={} is below the minimum of {} seconds",
                interval.as_secs(),
                min_interval.as_secs()
            );
        }

        let selectors = match env::var("SELECTORS_PATH") {
            Ok(path) => load_selectors(&path)?,
            Err(_) => defaults.selectors,
        };

        let night_start_hour = var_or("NIGHT_START_HOUR", defaults.schedule.night_start_hour)?;
        let night_end_hour = var_or("NIGHT_END_HOUR", defaults.schedule.night_end_hour)?;
        if night_start_hour > 23 || night_end_hour > 24 {
            bail!("night hours must be within 0..24");
        }

        let max_pages = var_or("MAX_PAGES", defaults.limits.max_pages)?;
        if max_pages == 0 {
            bail!("MAX_PAGES must be at least 1");
        }

        Ok(Self {
            state_path: env::var("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
            site_origin: env::var("SITE_ORIGIN")
                .map(|origin| origin.trim_end_matches('/').to_string())
                .unwrap_or(defaults.site_origin),
            limits: ScrapeLimits {
                max_pages,
                max_brands: var_or("MAX_BRANDS", defaults.limits.max_brands)?,
                max_results_per_page: var_or(
                    "MAX_RESULTS_PER_PAGE",
                    defaults.limits.max_results_per_page,
                )?,
            },
            schedule: Schedule {
                interval,
                night_interval: Duration::from_secs(var_or(
                    "NIGHT_INTERVAL_SECS",
                    defaults.schedule.night_interval.as_secs(),
                )?),
                night_start_hour,
                night_end_hour,
                jitter: Duration::from_secs(var_or(
                    "SCRAPE_JITTER_SECS",
                    defaults.schedule.jitter.as_secs(),
                )?),
            },
            selectors,
            no_results_markers: defaults.no_results_markers,
            notify_spacing: Duration::from_millis(var_or(
                "NOTIFY_SPACING_MS",
                defaults.notify_spacing.as_millis() as u64,
            )?),
            notify_dry_run: var_or("NOTIFY_DRY_RUN", defaults.notify_dry_run)?,
            pushover_url: env::var("PUSHOVER_URL").unwrap_or(defaults.pushover_url),
            navigation_timeout: Duration::from_secs(var_or(
                "NAVIGATION_TIMEOUT_SECS",
                defaults.navigation_timeout.as_secs(),
            )?),
            selector_timeout: Duration::from_secs(var_or(
                "SELECTOR_TIMEOUT_SECS",
                defaults.selector_timeout.as_secs(),
            )?),
        })
    }
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn load_selectors(path: &str) -> Result<Selectors> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read selectors from {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse selectors in {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn daytime_uses_regular_interval() {
        let schedule = Schedule::default();
        assert_eq!(schedule.delay_for_hour(12), Duration::from_secs(60));
        assert_eq!(schedule.delay_for_hour(6), Duration::from_secs(60));
    }

    #[test]
    fn night_uses_night_interval() {
        let schedule = Schedule::default();
        assert_eq!(schedule.delay_for_hour(0), Duration::from_secs(3600));
        assert_eq!(schedule.delay_for_hour(5), Duration::from_secs(3600));
    }

    #[test]
    fn night_window_can_wrap_midnight() {
        let schedule = Schedule {
            night_start_hour: 22,
            night_end_hour: 6,
            ..Schedule::default()
        };
        assert_eq!(schedule.delay_for_hour(23), Duration::from_secs(3600));
        assert_eq!(schedule.delay_for_hour(3), Duration::from_secs(3600));
        assert_eq!(schedule.delay_for_hour(21), Duration::from_secs(60));
    }

    #[test]
    fn jitter_only_stretches_daytime_waits() {
        let schedule = Schedule {
            interval: Duration::from_secs(120),
            jitter: Duration::from_secs(180),
            ..Schedule::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let day = schedule.jittered_delay(14, &mut rng);
            assert!(day >= Duration::from_secs(120) && day <= Duration::from_secs(300));
            assert_eq!(schedule.jittered_delay(2, &mut rng), Duration::from_secs(3600));
        }
        assert_eq!(
            Schedule::default().jittered_delay(14, &mut rng),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn partial_selector_file_keeps_defaults() {
        let selectors: Selectors =
            serde_json::from_str(r#"{ "result_row": "div.row" }"#).unwrap();
        assert_eq!(selectors.result_row, "div.row");
        assert_eq!(selectors.title, Selectors::default().title);
    }
}
