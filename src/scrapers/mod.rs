pub mod browser;
pub mod fetcher;
pub mod fingerprint;
pub mod listing;
pub mod pagination;
pub mod query;
pub mod traits;
pub mod types;

pub use browser::HeadlessChromeRenderer;
pub use fetcher::{FetchOutcome, PageFetcher};
pub use fingerprint::{random_fingerprint, BrowserFingerprint};
pub use listing::ListingExtractor;
pub use pagination::Paginator;
pub use query::{translate, SearchQuery};
pub use traits::PageRenderer;
pub use types::FilterSet;
