//! Crawl driver: sequences discovery, pagination and aggregation for every
//! category of one retailer.
//!
//! Each category moves through
//! `Pending -> SubcategoriesResolved (nested retailers) -> Paginating -> Done`,
//! or ends `Failed` when its subcategories cannot be resolved. Failures below
//! top-level discovery are logged, recorded in the [`CrawlSummary`] and never
//! stop the run.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use grocer_core::{AppConfig, Category, Retailer, Subcategory};

use crate::aggregator::RecordAggregator;
use crate::dataset::DatasetStore;
use crate::enrich::Enricher;
use crate::error::CrawlError;
use crate::navigator::Navigator;
use crate::resolver::{discover_categories, discover_subcategories};
use crate::retry::RetryPolicy;
use crate::site::SiteProfile;
use crate::walker::{PageDelay, PageFailure, PageOutcome, PageWalker, SamplingCap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryState {
    Pending,
    SubcategoriesResolved,
    Paginating,
    Done,
    Failed,
}

impl fmt::Display for CategoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CategoryState::Pending => "pending",
            CategoryState::SubcategoriesResolved => "subcategories_resolved",
            CategoryState::Paginating => "paginating",
            CategoryState::Done => "done",
            CategoryState::Failed => "failed",
        })
    }
}

/// How one category's traversal went.
#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub category: String,
    pub state: CategoryState,
    /// Records in the dataset file when the category finished.
    pub records: usize,
    /// Records that replaced an earlier one with the same product URL.
    pub replaced: usize,
    pub pages_visited: usize,
    /// Failed page-load or extraction attempts that were retried.
    pub retries: usize,
    /// Products whose nutrition lookup or image download failed.
    pub enrichment_failures: usize,
    pub page_failures: Vec<PageFailure>,
    /// Why the category failed, when it did.
    pub failure: Option<String>,
    pub dataset: Option<PathBuf>,
}

impl CategoryReport {
    fn new(category: &Category) -> Self {
        Self {
            category: category.slug.clone(),
            state: CategoryState::Pending,
            records: 0,
            replaced: 0,
            pages_visited: 0,
            retries: 0,
            enrichment_failures: 0,
            page_failures: Vec::new(),
            failure: None,
            dataset: None,
        }
    }

    fn transition(&mut self, to: CategoryState) {
        tracing::info!(category = %self.category, from = %self.state, to = %to, "category state");
        self.state = to;
    }
}

/// End-of-run report.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub retailer: Retailer,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub categories: Vec<CategoryReport>,
    /// Categories left out by the retailer's skip list.
    pub skipped: Vec<String>,
}

impl CrawlSummary {
    pub fn done(&self) -> impl Iterator<Item = &CategoryReport> {
        self.categories
            .iter()
            .filter(|c| c.state == CategoryState::Done)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CategoryReport> {
        self.categories
            .iter()
            .filter(|c| c.state == CategoryState::Failed)
    }

    #[must_use]
    pub fn pages_visited(&self) -> usize {
        self.categories.iter().map(|c| c.pages_visited).sum()
    }

    pub fn page_failures(&self) -> impl Iterator<Item = (&str, &PageFailure)> {
        self.categories.iter().flat_map(|c| {
            c.page_failures
                .iter()
                .map(move |failure| (c.category.as_str(), failure))
        })
    }

    #[must_use]
    pub fn records(&self) -> usize {
        self.categories.iter().map(|c| c.records).sum()
    }

    #[must_use]
    pub fn replaced(&self) -> usize {
        self.categories.iter().map(|c| c.replaced).sum()
    }

    #[must_use]
    pub fn retries(&self) -> usize {
        self.categories.iter().map(|c| c.retries).sum()
    }

    #[must_use]
    pub fn enrichment_failures(&self) -> usize {
        self.categories.iter().map(|c| c.enrichment_failures).sum()
    }

    #[must_use]
    pub fn report(&self, category: &str) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Logs the totals at `info` and every failure at `warn`.
    pub fn log(&self) {
        for report in self.failed() {
            tracing::warn!(
                category = %report.category,
                reason = report.failure.as_deref().unwrap_or_default(),
                "category failed"
            );
        }
        for (category, failure) in self.page_failures() {
            tracing::warn!(
                category,
                url = %failure.url,
                page = failure.page_number,
                reason = %failure.reason,
                "page skipped"
            );
        }
        tracing::info!(
            retailer = %self.retailer,
            done = self.done().count(),
            failed = self.failed().count(),
            skipped = self.skipped.len(),
            pages = self.pages_visited(),
            failed_pages = self.page_failures().count(),
            records = self.records(),
            replaced = self.replaced(),
            retries = self.retries(),
            enrichment_failures = self.enrichment_failures(),
            elapsed_secs = (self.finished_at - self.started_at).num_seconds(),
            "crawl finished"
        );
    }
}

impl fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} done, {} failed, {} skipped; {} pages ({} failed, {} retries), {} records ({} replaced)",
            self.retailer.display_name(),
            self.done().count(),
            self.failed().count(),
            self.skipped.len(),
            self.pages_visited(),
            self.page_failures().count(),
            self.retries(),
            self.records(),
            self.replaced()
        )?;
        if self.enrichment_failures() > 0 {
            writeln!(f, "  {} products could not be enriched", self.enrichment_failures())?;
        }
        for report in &self.categories {
            write!(
                f,
                "  {:<32} {:<10} {:>6} records {:>4} pages",
                report.category, report.state, report.records, report.pages_visited
            )?;
            if let Some(reason) = &report.failure {
                write!(f, "  ({reason})")?;
            }
            writeln!(f)?;
        }
        for (category, failure) in self.page_failures() {
            writeln!(f, "  skipped page {category} #{}: {}", failure.page_number, failure.url)?;
        }
        Ok(())
    }
}

/// Per-run tunables.
#[derive(Debug, Clone, Copy)]
pub struct CrawlOptions {
    pub cap: SamplingCap,
    pub delay: PageDelay,
    pub retry: RetryPolicy,
}

impl CrawlOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cap: SamplingCap::new(config.max_pages),
            delay: PageDelay::new(config.min_page_delay_ms, config.max_page_delay_ms),
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// Drives one navigator across a retailer's catalogue.
pub struct CrawlDriver<N> {
    nav: N,
    profile: SiteProfile,
    options: CrawlOptions,
    aggregator: RecordAggregator,
    enricher: Enricher,
}

impl<N: Navigator> CrawlDriver<N> {
    pub fn new(nav: N, retailer: Retailer, store: DatasetStore, options: CrawlOptions) -> Self {
        Self {
            nav,
            profile: SiteProfile::for_retailer(retailer),
            options,
            aggregator: RecordAggregator::new(store, retailer),
            enricher: Enricher::default(),
        }
    }

    #[must_use]
    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = enricher;
        self
    }

    /// Hands the navigator back, e.g. to shut the browser down.
    pub fn into_navigator(self) -> N {
        self.nav
    }

    /// # Errors
    ///
    /// Returns the discovery error; see [`discover_categories`].
    pub async fn discover(&mut self) -> Result<Vec<Category>, CrawlError> {
        discover_categories(&mut self.nav, &self.profile, &self.options.retry).await
    }

    /// Discovers the retailer's categories and crawls all of them.
    ///
    /// # Errors
    ///
    /// Only top-level discovery failures are returned. Everything after that
    /// is reported in the summary.
    pub async fn run(&mut self) -> Result<CrawlSummary, CrawlError> {
        let categories = match self.discover().await {
            Ok(categories) => categories,
            Err(e) => {
                tracing::error!(retailer = %self.profile.retailer, error = %e, "category discovery failed");
                return Err(e);
            }
        };
        Ok(self.crawl_categories(categories).await)
    }

    /// Crawls `categories` in order, one at a time.
    pub async fn crawl_categories(&mut self, categories: Vec<Category>) -> CrawlSummary {
        let started_at = Utc::now();
        let mut reports = Vec::with_capacity(categories.len());
        let mut skipped = Vec::new();

        for category in categories {
            if self.profile.is_skipped(&category) {
                tracing::info!(category = %category, "category skipped");
                skipped.push(category.slug);
                continue;
            }
            reports.push(self.crawl_category(category).await);
        }

        let summary = CrawlSummary {
            retailer: self.profile.retailer,
            started_at,
            finished_at: Utc::now(),
            categories: reports,
            skipped,
        };
        summary.log();
        summary
    }

    async fn crawl_category(&mut self, mut category: Category) -> CategoryReport {
        let mut report = CategoryReport::new(&category);

        if self.profile.nested && category.subcategories.is_none() {
            let resolved =
                discover_subcategories(&mut self.nav, &self.profile, &category, &self.options.retry)
                    .await;
            match resolved {
                Ok(subs) => category = category.with_subcategories(subs),
                Err(e) => {
                    tracing::warn!(category = %category, error = %e, "subcategory discovery failed");
                    report.failure = Some(e.to_string());
                    report.transition(CategoryState::Failed);
                    return report;
                }
            }
        }
        if category.subcategories.is_some() {
            report.transition(CategoryState::SubcategoriesResolved);
        }

        match self.aggregator.begin(&category) {
            Ok(path) => report.dataset = Some(path),
            Err(e) => {
                tracing::warn!(category = %category, error = %e, "could not open dataset");
                report.failure = Some(e.to_string());
                report.transition(CategoryState::Failed);
                return report;
            }
        }
        report.transition(CategoryState::Paginating);

        match &category.subcategories {
            Some(subs) => {
                for sub in subs {
                    self.walk(&sub.entry_url, &category, Some(sub), &mut report)
                        .await;
                }
            }
            None => {
                let entry = self.profile.category_entry_url(&category);
                self.walk(&entry, &category, None, &mut report).await;
            }
        }

        if let Some(dataset) = self.aggregator.finish(&category) {
            report.records = dataset.records;
        }
        report.transition(CategoryState::Done);
        tracing::info!(
            category = %category,
            records = report.records,
            pages = report.pages_visited,
            failed_pages = report.page_failures.len(),
            replaced = report.replaced,
            retries = report.retries,
            "category complete"
        );
        report
    }

    /// Walks one entry point, persisting every page before fetching the next.
    async fn walk(
        &mut self,
        entry_url: &str,
        category: &Category,
        subcategory: Option<&Subcategory>,
        report: &mut CategoryReport,
    ) {
        let mut walker = PageWalker::new(
            entry_url,
            &self.profile,
            self.options.retry,
            self.options.cap,
            self.options.delay,
        );

        while let Some(outcome) = walker.next_page(&mut self.nav).await {
            match outcome {
                PageOutcome::Extracted(mut page) => {
                    let enriched = self.enricher.enrich_page(&mut self.nav, &mut page).await;
                    report.enrichment_failures += enriched.failures;
                    let url = page.url.clone();
                    let page_number = page.page_number;
                    match self.aggregator.ingest(page, category, subcategory) {
                        Ok(stats) => report.replaced += stats.replaced,
                        Err(e) => {
                            tracing::warn!(
                                category = %category,
                                url = %url,
                                page = page_number,
                                error = %e,
                                "failed to persist page"
                            );
                            report.page_failures.push(PageFailure {
                                url,
                                page_number,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
                PageOutcome::Failed(failure) => report.page_failures.push(failure),
            }
        }
        report.pages_visited += walker.visited();
        report.retries += walker.retries();
    }
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
