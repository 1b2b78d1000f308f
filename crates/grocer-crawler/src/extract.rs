//! Decoding of products-script output into a [`PageResult`].
//!
//! Two shapes are accepted:
//!
//! - a bare array of records (count-paginated listings), and
//! - an object `{"products": [...], "nextPage": "..."}` (link-paginated listings).
//!
//! Individual entries that are not JSON objects are dropped and counted.
//! Records with missing fields are kept as they are.

use grocer_core::ProductRecord;
use serde_json::Value;

use crate::error::CrawlError;
use crate::pagination::{NextPage, PaginationStrategy};

const PRODUCTS_FIELD: &str = "products";
const NEXT_PAGE_FIELD: &str = "nextPage";

/// Records extracted from one listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// URL the page was loaded from.
    pub url: String,
    /// 1-based position of the page within its walk.
    pub page_number: usize,
    pub records: Vec<ProductRecord>,
    /// Set for next-link walks only.
    pub next_page: Option<NextPage>,
    /// Entries discarded because they were not JSON objects.
    pub dropped: usize,
}

/// Turns the products script's output into a [`PageResult`].
///
/// # Errors
///
/// Returns [`CrawlError::UnexpectedShape`] when the output is neither an
/// array nor an object carrying a `products` array. A `null` result from a
/// page that never rendered lands here too.
pub fn decode_products_page(
    output: Value,
    strategy: PaginationStrategy,
    url: &str,
    page_number: usize,
) -> Result<PageResult, CrawlError> {
    let (entries, next_raw) = match output {
        Value::Array(entries) => (entries, None),
        Value::Object(mut map) => match map.remove(PRODUCTS_FIELD) {
            Some(Value::Array(entries)) => (entries, map.remove(NEXT_PAGE_FIELD)),
            _ => return Err(shape_error(url)),
        },
        _ => return Err(shape_error(url)),
    };

    let mut records = Vec::with_capacity(entries.len());
    let mut dropped = 0usize;
    for entry in entries {
        match ProductRecord::from_value(entry) {
            Ok(record) => records.push(record),
            Err(other) => {
                dropped += 1;
                tracing::warn!(url, entry = %other, "dropping non-object product entry");
            }
        }
    }

    let next_page = match strategy {
        PaginationStrategy::NextLink => Some(NextPage::from_extractor(next_raw.as_ref(), url)),
        PaginationStrategy::TotalCount => None,
    };

    Ok(PageResult {
        url: url.to_owned(),
        page_number,
        records,
        next_page,
        dropped,
    })
}

fn shape_error(url: &str) -> CrawlError {
    CrawlError::UnexpectedShape {
        context: format!("products on {url}"),
        expected: "an array of products or an object with a `products` array",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const URL: &str = "https://www.woolworths.com.au/shop/browse/bakery?pageNumber=1";

    #[test]
    fn decodes_link_paginated_object() {
        let output = json!({
            "products": [
                {"name": "White Bread", "price": 3.5, "href": "https://w/p/1"},
                {"name": "Rye Bread", "price": 4.0, "href": "https://w/p/2"}
            ],
            "nextPage": "https://www.woolworths.com.au/shop/browse/bakery?pageNumber=2"
        });
        let page = decode_products_page(output, PaginationStrategy::NextLink, URL, 1).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].name(), Some("White Bread"));
        assert_eq!(
            page.next_page,
            Some(NextPage::Url(
                "https://www.woolworths.com.au/shop/browse/bakery?pageNumber=2".to_owned()
            ))
        );
        assert_eq!(page.dropped, 0);
    }

    #[test]
    fn decodes_bare_array_for_counted_listings() {
        let output = json!([{"name": "Milk 2L", "price": "$3.10"}]);
        let page = decode_products_page(output, PaginationStrategy::TotalCount, URL, 4).unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.page_number, 4);
        assert!(page.next_page.is_none());
    }

    #[test]
    fn bare_array_under_next_link_ends_walk() {
        let page = decode_products_page(json!([]), PaginationStrategy::NextLink, URL, 1).unwrap();
        assert_eq!(page.next_page, Some(NextPage::End));
    }

    #[test]
    fn non_object_entries_are_dropped_and_counted() {
        let output = json!({"products": [{"name": "A"}, "junk", 5, {"price": 1}], "nextPage": "NONE"});
        let page = decode_products_page(output, PaginationStrategy::NextLink, URL, 1).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.dropped, 2);
        // the record with no name survives untouched
        assert_eq!(page.records[1].name(), None);
    }

    #[test]
    fn null_output_is_a_shape_error() {
        let err = decode_products_page(Value::Null, PaginationStrategy::NextLink, URL, 1)
            .unwrap_err();
        assert!(matches!(err, CrawlError::UnexpectedShape { .. }));
    }

    #[test]
    fn object_without_products_is_a_shape_error() {
        let err = decode_products_page(
            json!({"items": []}),
            PaginationStrategy::NextLink,
            URL,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, CrawlError::UnexpectedShape { .. }));
    }
}
