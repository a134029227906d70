use rand::seq::IndexedRandom;
use rand::Rng;
use std::time::Duration;

const USER_AGENTS: &[&str] = &[
    // Chrome Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 6.1; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36",
    // Chrome Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.5790.170 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36",
    // Firefox
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:115.0) Gecko/20100101 Firefox/115.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:115.0) Gecko/20100101 Firefox/115.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:115.0) Gecko/20100101 Firefox/115.0",
    // Safari
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Safari/605.1.15",
    // Mobile
    "Mozilla/5.0 (Linux; Android 12; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 16_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1",
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "de-DE,de;q=0.9,en;q=0.8",
    "fr-FR,fr;q=0.9,en;q=0.8",
    "es-ES,es;q=0.9,en;q=0.8",
    "it-IT,it;q=0.9,en;q=0.8",
    "nl-NL,nl;q=0.9,en;q=0.8",
    "sl-SI,sl;q=0.9,en;q=0.8",
    "hr-HR,hr;q=0.9,en;q=0.8",
    "pt-PT,pt;q=0.9,en;q=0.8",
];

const DESKTOP_VIEWPORTS: &[Viewport] = &[
    Viewport::desktop(1920, 1080),
    Viewport::desktop(1366, 768),
    Viewport::desktop(1440, 900),
    Viewport::desktop(1600, 900),
    Viewport::desktop(1280, 720),
    Viewport::desktop(1536, 864),
    Viewport::desktop(1680, 1050),
    Viewport::desktop(2560, 1440),
    Viewport::desktop(1024, 768),
    Viewport::desktop(1280, 1024),
];

const MOBILE_VIEWPORTS: &[Viewport] = &[
    Viewport::mobile(375, 667),
    Viewport::mobile(414, 896),
    Viewport::mobile(360, 640),
    Viewport::mobile(412, 915),
    Viewport::mobile(768, 1024),
    Viewport::mobile(820, 1180),
];

const TIMEZONES: &[&str] = &[
    "Europe/Ljubljana",
    "Europe/Zagreb",
    "Europe/Vienna",
    "Europe/Berlin",
    "Europe/Rome",
    "Europe/Budapest",
    "Europe/Prague",
    "Europe/Warsaw",
    "Europe/Zurich",
    "Europe/Brussels",
];

const MOBILE_SHARE: f64 = 0.2;
const DELAY_MS: std::ops::RangeInclusive<u64> = 2_000..=5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub mobile: bool,
}

impl Viewport {
    const fn desktop(width: u32, height: u32) -> Self {
        Self { width, height, mobile: false }
    }

    const fn mobile(width: u32, height: u32) -> Self {
        Self { width, height, mobile: true }
    }
}

/// Browser identity presented for a single page fetch
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserFingerprint {
    pub user_agent: String,
    pub accept_language: String,
    /// Primary tag of `accept_language`, e.g. `sl-SI`
    pub locale: String,
    pub viewport: Viewport,
    pub timezone: String,
    /// Pause before navigating
    pub delay: Duration,
}

/// Draw a fresh fingerprint. Every dimension is picked independently.
pub fn random_fingerprint<R: Rng + ?Sized>(rng: &mut R) -> BrowserFingerprint {
    let user_agent = USER_AGENTS.choose(rng).copied().unwrap_or(USER_AGENTS[0]);
    let accept_language = ACCEPT_LANGUAGES
        .choose(rng)
        .copied()
        .unwrap_or(ACCEPT_LANGUAGES[0]);

    let pool = if rng.random_bool(MOBILE_SHARE) {
        MOBILE_VIEWPORTS
    } else {
        DESKTOP_VIEWPORTS
    };
    let viewport = pool.choose(rng).copied().unwrap_or(DESKTOP_VIEWPORTS[0]);
    let timezone = TIMEZONES.choose(rng).copied().unwrap_or(TIMEZONES[0]);
    let delay = Duration::from_millis(rng.random_range(DELAY_MS));

    BrowserFingerprint {
        user_agent: user_agent.to_string(),
        locale: accept_language
            .split(',')
            .next()
            .unwrap_or(accept_language)
            .to_string(),
        accept_language: accept_language.to_string(),
        viewport,
        timezone: timezone.to_string(),
        delay,
    }
}
