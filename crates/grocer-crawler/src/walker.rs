//! Pagination walker: drives a [`Navigator`] across the listing pages of one
//! entry point, one page per call to [`PageWalker::next_page`].
//!
//! The walker owns no browser. The caller passes the navigator in on every
//! step, so it can use the same tab between pages (e.g. for enrichment) and
//! persist each page before asking for the next one.

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;

use crate::error::CrawlError;
use crate::extract::{decode_products_page, PageResult};
use crate::navigator::{Navigator, ScriptId};
use crate::pagination::{page_url, parse_page_count, NextPage, PaginationStrategy};
use crate::retry::RetryPolicy;
use crate::site::SiteProfile;

/// Upper bound on pages visited per walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SamplingCap {
    max_pages: Option<usize>,
}

impl SamplingCap {
    pub const UNBOUNDED: SamplingCap = SamplingCap { max_pages: None };

    #[must_use]
    pub fn new(max_pages: Option<usize>) -> Self {
        Self { max_pages }
    }

    #[must_use]
    pub fn max_pages(self) -> Option<usize> {
        self.max_pages
    }

    fn allows(self, visited: usize) -> bool {
        self.max_pages.is_none_or(|max| visited < max)
    }

    fn clamp(self, total: usize) -> usize {
        self.max_pages.map_or(total, |max| total.min(max))
    }
}

/// Randomized pause between page loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageDelay {
    min_ms: u64,
    max_ms: u64,
}

impl PageDelay {
    pub const NONE: PageDelay = PageDelay { min_ms: 0, max_ms: 0 };

    /// `max_ms` below `min_ms` is raised to `min_ms`.
    #[must_use]
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms,
            max_ms: max_ms.max(min_ms),
        }
    }

    pub(crate) async fn pause(self) {
        if self.max_ms == 0 {
            return;
        }
        let ms = rand::rng().random_range(self.min_ms..=self.max_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// A page the walker gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub url: String,
    pub page_number: usize,
    pub reason: String,
}

#[derive(Debug)]
pub enum PageOutcome {
    Extracted(PageResult),
    Failed(PageFailure),
}

#[derive(Debug)]
enum WalkState {
    NotStarted,
    Linked {
        url: String,
        page_number: usize,
        /// The previous page failed, so `url` is a guess rather than a link
        /// the site reported.
        guessed: bool,
    },
    Counted {
        next: usize,
        last: usize,
    },
    Finished,
}

/// One walk over one entry point. Not restartable: build a new walker to
/// start again from page 1.
#[derive(Debug)]
pub struct PageWalker {
    entry_url: String,
    strategy: PaginationStrategy,
    ready_selector: &'static str,
    retry: RetryPolicy,
    cap: SamplingCap,
    delay: PageDelay,
    state: WalkState,
    visited: usize,
    retries: usize,
    /// Listing URLs already requested by a link-paginated walk.
    seen: HashSet<String>,
    navigations: usize,
}

impl PageWalker {
    #[must_use]
    pub fn new(
        entry_url: impl Into<String>,
        profile: &SiteProfile,
        retry: RetryPolicy,
        cap: SamplingCap,
        delay: PageDelay,
    ) -> Self {
        Self {
            entry_url: entry_url.into(),
            strategy: profile.pagination,
            ready_selector: profile.ready_selector,
            retry,
            cap,
            delay,
            state: WalkState::NotStarted,
            visited: 0,
            retries: 0,
            seen: HashSet::new(),
            navigations: 0,
        }
    }

    /// Listing pages visited so far (successful or not). The page-count probe
    /// is not counted.
    #[must_use]
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Failed attempts that were followed by another try, across every page
    /// and the page-count probe.
    #[must_use]
    pub fn retries(&self) -> usize {
        self.retries
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, WalkState::Finished)
    }

    /// Visits the next page. Returns `None` once the walk is exhausted or the
    /// sampling cap is reached.
    pub async fn next_page<N: Navigator>(&mut self, nav: &mut N) -> Option<PageOutcome> {
        if let WalkState::NotStarted = self.state {
            if let Err(failure) = self.start(nav).await {
                self.state = WalkState::Finished;
                return Some(PageOutcome::Failed(failure));
            }
        }

        match std::mem::replace(&mut self.state, WalkState::Finished) {
            WalkState::NotStarted | WalkState::Finished => None,
            WalkState::Linked {
                url,
                page_number,
                guessed,
            } => {
                if !self.cap.allows(self.visited) {
                    tracing::debug!(entry = %self.entry_url, visited = self.visited, "sampling cap reached");
                    return None;
                }
                self.seen.insert(url.clone());
                let outcome = self.visit(nav, &url, page_number).await;
                let next = match &outcome {
                    PageOutcome::Extracted(page) => match &page.next_page {
                        Some(NextPage::Url(next)) => Some((next.clone(), false)),
                        _ => None,
                    },
                    // Without the page we have no next link. Guess the
                    // numbered successor once; two failures in a row end the walk.
                    PageOutcome::Failed(_) if !guessed => {
                        Some((page_url(&self.entry_url, page_number + 1), true))
                    }
                    PageOutcome::Failed(_) => None,
                };
                self.state = match next {
                    Some((next, _)) if self.seen.contains(&next) => {
                        tracing::warn!(
                            entry = %self.entry_url,
                            from = %url,
                            to = %next,
                            "next page was already visited, ending walk"
                        );
                        WalkState::Finished
                    }
                    Some((next, guessed)) => WalkState::Linked {
                        url: next,
                        page_number: page_number + 1,
                        guessed,
                    },
                    None => WalkState::Finished,
                };
                Some(outcome)
            }
            WalkState::Counted { next, last } => {
                if next > last {
                    return None;
                }
                let url = page_url(&self.entry_url, next);
                let outcome = self.visit(nav, &url, next).await;
                if next < last {
                    self.state = WalkState::Counted {
                        next: next + 1,
                        last,
                    };
                }
                Some(outcome)
            }
        }
    }

    async fn start<N: Navigator>(&mut self, nav: &mut N) -> Result<(), PageFailure> {
        self.state = match self.strategy {
            PaginationStrategy::NextLink => WalkState::Linked {
                url: self.entry_url.clone(),
                page_number: 1,
                guessed: false,
            },
            PaginationStrategy::TotalCount => {
                let first = page_url(&self.entry_url, 1);
                self.before_navigation().await;
                let selector = self.ready_selector;
                let mut attempts = 0usize;
                let total = self
                    .retry
                    .run(nav, &first, |nav| {
                        attempts += 1;
                        Box::pin(probe_page_count(nav, first.clone(), selector))
                    })
                    .await;
                self.retries += attempts.saturating_sub(1);
                let total = total.map_err(|e| {
                    tracing::warn!(url = %first, error = %e, "page count probe failed");
                    PageFailure {
                        url: first.clone(),
                        page_number: 1,
                        reason: e.to_string(),
                    }
                })?;

                let last = self.cap.clamp(total);
                tracing::debug!(entry = %self.entry_url, total, last, "page count probed");
                WalkState::Counted { next: 1, last }
            }
        };
        Ok(())
    }

    async fn visit<N: Navigator>(
        &mut self,
        nav: &mut N,
        url: &str,
        page_number: usize,
    ) -> PageOutcome {
        self.before_navigation().await;
        self.visited += 1;

        let strategy = self.strategy;
        let selector = self.ready_selector;
        let mut attempts = 0usize;
        let result = self
            .retry
            .run(nav, url, |nav| {
                attempts += 1;
                Box::pin(fetch_listing(
                    nav,
                    url.to_owned(),
                    selector,
                    strategy,
                    page_number,
                ))
            })
            .await;
        self.retries += attempts.saturating_sub(1);

        match result {
            Ok(page) => {
                tracing::debug!(
                    url,
                    page = page_number,
                    records = page.records.len(),
                    "page extracted"
                );
                PageOutcome::Extracted(page)
            }
            Err(e) => {
                tracing::warn!(url, page = page_number, error = %e, "page failed, skipping");
                PageOutcome::Failed(PageFailure {
                    url: url.to_owned(),
                    page_number,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn before_navigation(&mut self) {
        if self.navigations > 0 {
            self.delay.pause().await;
        }
        self.navigations += 1;
    }
}

/// Loads `url` and waits for the listing to render. A ready-wait timeout is
/// tolerated: the last page of a link-paginated listing has no "next" control,
/// so its ready selector never shows.
pub(crate) async fn load_rendered<N: Navigator>(
    nav: &mut N,
    url: &str,
    selector: &str,
) -> Result<(), CrawlError> {
    nav.load(url).await?;
    match nav.wait_until_ready(selector).await {
        Ok(()) => Ok(()),
        Err(CrawlError::ReadyTimeout { .. }) => {
            tracing::debug!(url, selector, "ready selector never appeared, extracting anyway");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn probe_page_count<N: Navigator>(
    nav: &mut N,
    url: String,
    selector: &'static str,
) -> Result<usize, CrawlError> {
    load_rendered(nav, &url, selector).await?;
    let output = nav.run_extractor(ScriptId::PageCount).await?;
    parse_page_count(&output, &url)
}

async fn fetch_listing<N: Navigator>(
    nav: &mut N,
    url: String,
    selector: &'static str,
    strategy: PaginationStrategy,
    page_number: usize,
) -> Result<PageResult, CrawlError> {
    load_rendered(nav, &url, selector).await?;
    let output = nav.run_extractor(ScriptId::Products).await?;
    // Redirects change the base for relative next links.
    let effective = nav.current_url().await.unwrap_or(url);
    decode_products_page(output, strategy, &effective, page_number)
}

#[cfg(test)]
#[path = "walker_test.rs"]
mod tests;
