pub mod aggregator;
#[cfg(feature = "cdp")]
pub mod cdp;
pub mod dataset;
pub mod driver;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod navigator;
pub mod pagination;
pub mod resolver;
pub mod retry;
pub mod site;
pub mod walker;

#[cfg(test)]
mod testing;

pub use aggregator::{IngestStats, RecordAggregator};
#[cfg(feature = "cdp")]
pub use cdp::CdpNavigator;
pub use dataset::{CombineReport, DatasetStore};
pub use driver::{CategoryReport, CategoryState, CrawlDriver, CrawlOptions, CrawlSummary};
pub use enrich::{Enricher, ImageDownloader, NutritionFetcher};
pub use error::CrawlError;
pub use extract::PageResult;
pub use navigator::{Navigator, ScriptId, ScriptLibrary};
pub use pagination::{NextPage, PaginationStrategy};
pub use retry::RetryPolicy;
pub use site::SiteProfile;
pub use walker::{PageDelay, PageFailure, PageOutcome, PageWalker, SamplingCap};
