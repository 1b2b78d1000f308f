//! Listing pagination: the two strategies the retailers use and the URL and
//! metadata helpers both rely on.
//!
//! ## Next-link
//!
//! The products script returns a `nextPage` field alongside the records:
//!
//! ```text
//! {"products": [...], "nextPage": "https://www.woolworths.com.au/shop/browse/bakery?pageNumber=2"}
//! {"products": [...], "nextPage": "NONE"}
//! ```
//!
//! ## Total-count
//!
//! A dedicated page-count script runs once on page 1 and returns the number
//! of pages as a number or numeric string. Pages are then addressed directly
//! through the `pageNumber` query parameter.

use serde_json::Value;

use crate::error::CrawlError;

const PAGE_PARAM: &str = "pageNumber";

/// Sentinel the next-link extractor uses for "this is the last page".
pub const NO_NEXT_PAGE: &str = "NONE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStrategy {
    /// Follow the `nextPage` pointer each page reports until it says `NONE`.
    NextLink,
    /// Probe the page count once, then visit `pageNumber=1..=N`.
    TotalCount,
}

/// Where a next-link walk goes after the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    Url(String),
    End,
}

impl NextPage {
    /// Interprets a `nextPage` value reported by the extractor.
    ///
    /// The sentinel (any case), `null`, an empty string, or a missing field
    /// all mean the walk is over. Relative links are resolved against
    /// `current_url`.
    #[must_use]
    pub fn from_extractor(raw: Option<&Value>, current_url: &str) -> Self {
        let Some(link) = raw.and_then(Value::as_str).map(str::trim) else {
            return NextPage::End;
        };
        if link.is_empty() || link.eq_ignore_ascii_case(NO_NEXT_PAGE) {
            return NextPage::End;
        }

        match reqwest::Url::parse(current_url).and_then(|base| base.join(link)) {
            Ok(url) => NextPage::Url(url.to_string()),
            Err(_) => NextPage::Url(link.to_owned()),
        }
    }
}

/// Returns `entry` with its `pageNumber` query parameter set to `page`,
/// dropping any fragment. Other query parameters are preserved.
#[must_use]
pub fn page_url(entry: &str, page: usize) -> String {
    let mut url = match reqwest::Url::parse(entry) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(
                entry,
                error = %e,
                "could not parse listing URL, appending page parameter verbatim"
            );
            let base = entry.split(['?', '#']).next().unwrap_or(entry);
            return format!("{base}?{PAGE_PARAM}={page}");
        }
    };

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != PAGE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.set_fragment(None);
    url.set_query(None);
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in &retained {
            query.append_pair(key, value);
        }
        query.append_pair(PAGE_PARAM, &page.to_string());
    }

    url.to_string()
}

/// Reads the total page count returned by the page-count script.
///
/// # Errors
///
/// Returns [`CrawlError::UnexpectedShape`] when the value is neither a
/// non-negative integer nor a string holding one.
pub fn parse_page_count(value: &Value, context: &str) -> Result<usize, CrawlError> {
    let shape_error = || CrawlError::UnexpectedShape {
        context: context.to_owned(),
        expected: "a non-negative page count",
    };

    let count = match value {
        Value::Number(n) => n.as_u64().ok_or_else(shape_error)?,
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| shape_error())?,
        _ => return Err(shape_error()),
    };

    usize::try_from(count).map_err(|_| shape_error())
}
