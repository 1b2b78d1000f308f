//! Per-retailer crawl profiles.
//!
//! Coles nests products under subcategories and reports a total page count;
//! Woolworths lists products directly under each category and links to the
//! next page. Everything the engine needs to know about those differences
//! lives here, so the walker and driver stay retailer-agnostic.

use grocer_core::{Category, Retailer};

use crate::pagination::{page_url, PaginationStrategy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub retailer: Retailer,
    /// Category listing pages only link to subcategories; products are
    /// reached one level down.
    pub nested: bool,
    pub pagination: PaginationStrategy,
    /// CSS selector whose presence marks a listing page as rendered.
    pub ready_selector: &'static str,
    /// Categories never crawled (e.g. behind an age gate).
    pub skip_categories: &'static [&'static str],
}

impl SiteProfile {
    #[must_use]
    pub fn for_retailer(retailer: Retailer) -> Self {
        match retailer {
            Retailer::Coles => Self {
                retailer,
                nested: true,
                pagination: PaginationStrategy::TotalCount,
                ready_selector: ".product-list",
                skip_categories: &["tobacco"],
            },
            Retailer::Woolworths => Self {
                retailer,
                nested: false,
                pagination: PaginationStrategy::NextLink,
                ready_selector: ".paging-next",
                skip_categories: &[],
            },
        }
    }

    #[must_use]
    pub fn categories_url(&self) -> &'static str {
        self.retailer.categories_url()
    }

    /// First listing page of a top-level category.
    #[must_use]
    pub fn category_entry_url(&self, category: &Category) -> String {
        page_url(
            &format!("{}{}", self.retailer.browse_base_url(), category.slug),
            1,
        )
    }

    /// First listing page of a subcategory under `category`.
    #[must_use]
    pub fn subcategory_entry_url(&self, category: &Category, subcategory_slug: &str) -> String {
        page_url(
            &format!(
                "{}{}/{}",
                self.retailer.browse_base_url(),
                category.slug,
                subcategory_slug
            ),
            1,
        )
    }

    #[must_use]
    pub fn is_skipped(&self, category: &Category) -> bool {
        self.skip_categories.contains(&category.slug.as_str())
    }
}
