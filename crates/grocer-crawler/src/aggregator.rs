//! Per-category record accumulation.
//!
//! Every extracted page is stamped with provenance, merged into its
//! category's collection, and the whole collection is flushed to disk before
//! the walker moves on. A crash therefore loses at most the page in flight.
//! A page whose flush fails is dropped from the collection, so memory never
//! holds records the file does not.

use std::collections::HashMap;
use std::path::PathBuf;

use grocer_core::{Category, ProductRecord, Retailer, Subcategory};

use crate::dataset::{write_records, DatasetStore};
use crate::error::CrawlError;
use crate::extract::PageResult;

/// What one [`RecordAggregator::ingest`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestStats {
    pub added: usize,
    /// Records that replaced an earlier one with the same product URL.
    pub replaced: usize,
    /// Collection size after the merge.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub path: PathBuf,
    pub records: usize,
    pub pages: usize,
}

#[derive(Debug, Clone)]
struct OpenDataset {
    path: PathBuf,
    records: Vec<ProductRecord>,
    /// Product URL -> index into `records`.
    by_url: HashMap<String, usize>,
    pages: usize,
}

impl OpenDataset {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            records: Vec::new(),
            by_url: HashMap::new(),
            pages: 0,
        }
    }

    /// Last write wins, in place: a repeated URL keeps its original position.
    /// Records without a URL cannot be matched and are always appended.
    fn merge(&mut self, record: ProductRecord) -> bool {
        let Some(url) = record.product_url().map(str::to_owned) else {
            self.records.push(record);
            return false;
        };
        if let Some(&index) = self.by_url.get(&url) {
            self.records[index] = record;
            return true;
        }
        self.by_url.insert(url, self.records.len());
        self.records.push(record);
        false
    }
}

/// Holds the collection of every category currently being crawled for one
/// retailer.
#[derive(Debug)]
pub struct RecordAggregator {
    store: DatasetStore,
    retailer: Retailer,
    open: HashMap<String, OpenDataset>,
    /// Dataset file -> slug of the category that wrote it this run.
    claimed: HashMap<PathBuf, String>,
}

impl RecordAggregator {
    #[must_use]
    pub fn new(store: DatasetStore, retailer: Retailer) -> Self {
        Self {
            store,
            retailer,
            open: HashMap::new(),
            claimed: HashMap::new(),
        }
    }

    /// Starts a fresh collection for `category` and writes it out empty, so a
    /// category that reached pagination always has a file.
    ///
    /// Slugs are flattened into file names, so two categories can map to the
    /// same file (`drinks/soft` and `drinks-soft`). The first one to begin
    /// keeps it for the rest of the run.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::DatasetConflict`] if another category already
    /// wrote this file, or [`CrawlError::Io`] if the file cannot be written.
    pub fn begin(&mut self, category: &Category) -> Result<PathBuf, CrawlError> {
        let path = self.store.path_for(self.retailer, category);
        if let Some(owner) = self.claimed.get(&path) {
            if *owner != category.slug {
                return Err(CrawlError::DatasetConflict {
                    category: category.slug.clone(),
                    owner: owner.clone(),
                    path,
                });
            }
        }
        write_records(&path, &[])?;
        self.claimed.insert(path.clone(), category.slug.clone());
        tracing::debug!(category = %category, path = %path.display(), "dataset opened");
        self.open
            .insert(category.slug.clone(), OpenDataset::new(path.clone()));
        Ok(path)
    }

    /// Merges one page into `category`'s collection and flushes it.
    ///
    /// Opens the collection first if [`begin`](Self::begin) was not called.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Io`] if the flush fails. The page is then left
    /// out of the collection entirely; the file and the collection still match.
    pub fn ingest(
        &mut self,
        page: PageResult,
        category: &Category,
        subcategory: Option<&Subcategory>,
    ) -> Result<IngestStats, CrawlError> {
        if !self.open.contains_key(&category.slug) {
            self.begin(category)?;
        }
        let Some(dataset) = self.open.get_mut(&category.slug) else {
            return Ok(IngestStats::default());
        };

        let mut staged = dataset.clone();
        let mut stats = IngestStats::default();
        for mut record in page.records {
            record.set_provenance(&category.slug, subcategory.map(|s| s.slug.as_str()));
            if staged.merge(record) {
                stats.replaced += 1;
            } else {
                stats.added += 1;
            }
        }
        staged.pages += 1;
        stats.total = staged.records.len();

        write_records(&staged.path, &staged.records)?;
        *dataset = staged;
        tracing::debug!(
            category = %category,
            subcategory = subcategory.map(|s| s.slug.as_str()),
            page = page.page_number,
            added = stats.added,
            replaced = stats.replaced,
            total = stats.total,
            "page flushed"
        );
        Ok(stats)
    }

    /// Current records of an open collection.
    #[must_use]
    pub fn records(&self, category: &Category) -> Option<&[ProductRecord]> {
        self.open.get(&category.slug).map(|d| d.records.as_slice())
    }

    /// Closes `category`'s collection. The file on disk already holds exactly
    /// these records.
    pub fn finish(&mut self, category: &Category) -> Option<DatasetSummary> {
        self.open.remove(&category.slug).map(|dataset| DatasetSummary {
            path: dataset.path,
            records: dataset.records.len(),
            pages: dataset.pages,
        })
    }
}
