//! Category discovery.
//!
//! Both operations are single-page reads: load one URL, run one extractor.
//! Scripts may report either bare slugs (`"fruit-veg"`) or full listing URLs
//! (`"https://…/browse/dairy/milk?pageNumber=1#"`); both are reduced to slugs.

use grocer_core::{Category, Subcategory};
use serde_json::Value;

use crate::error::CrawlError;
use crate::navigator::{Navigator, ScriptId};
use crate::retry::RetryPolicy;
use crate::site::SiteProfile;

const BROWSE_SEGMENT: &str = "browse/";

/// Discovers the retailer's top-level categories.
///
/// # Errors
///
/// Any error here is fatal for the run: the categories page could not be
/// loaded or scripted after retries, or it listed nothing
/// ([`CrawlError::NoCategories`]).
pub async fn discover_categories<N: Navigator>(
    nav: &mut N,
    profile: &SiteProfile,
    retry: &RetryPolicy,
) -> Result<Vec<Category>, CrawlError> {
    let url = profile.categories_url();
    let output = retry
        .run(nav, url, |nav| {
            Box::pin(run_script_on(nav, url, ScriptId::Categories))
        })
        .await?;

    let slugs = slug_list(&output, url, None)?;
    if slugs.is_empty() {
        return Err(CrawlError::NoCategories {
            retailer: profile.retailer,
        });
    }

    tracing::info!(
        retailer = %profile.retailer,
        count = slugs.len(),
        "discovered categories"
    );
    Ok(slugs.into_iter().map(Category::new).collect())
}

/// Discovers the subcategories listed on `category`'s first page.
///
/// An empty list is treated like a page that failed to render and retried.
///
/// # Errors
///
/// Returns the last error once retries are exhausted. The caller marks the
/// category failed and moves on.
pub async fn discover_subcategories<N: Navigator>(
    nav: &mut N,
    profile: &SiteProfile,
    category: &Category,
    retry: &RetryPolicy,
) -> Result<Vec<Subcategory>, CrawlError> {
    let url = profile.category_entry_url(category);

    let slugs = retry
        .run(nav, &url, |nav| {
            let url = url.clone();
            let category_slug = category.slug.clone();
            Box::pin(async move {
                let output = run_script_on(nav, &url, ScriptId::SubcategoryUrls).await?;
                let slugs = slug_list(&output, &url, Some(&category_slug))?;
                if slugs.is_empty() {
                    return Err(CrawlError::UnexpectedShape {
                        context: format!("subcategories on {url}"),
                        expected: "at least one subcategory link",
                    });
                }
                Ok(slugs)
            })
        })
        .await?;

    tracing::debug!(
        category = %category.slug,
        count = slugs.len(),
        "discovered subcategories"
    );

    Ok(slugs
        .into_iter()
        .map(|slug| Subcategory {
            entry_url: profile.subcategory_entry_url(category, &slug),
            slug,
        })
        .collect())
}

async fn run_script_on<N: Navigator>(
    nav: &mut N,
    url: &str,
    script: ScriptId,
) -> Result<Value, CrawlError> {
    nav.load(url).await?;
    nav.run_extractor(script).await
}

/// Reads an array of slugs or URLs, normalizing each to a slug and dropping
/// blanks and repeats while keeping the site's order.
fn slug_list(
    output: &Value,
    url: &str,
    parent: Option<&str>,
) -> Result<Vec<String>, CrawlError> {
    let entries = output.as_array().ok_or_else(|| CrawlError::UnexpectedShape {
        context: format!("category links on {url}"),
        expected: "an array of slugs or URLs",
    })?;

    let mut slugs: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(raw) = entry.as_str() else {
            tracing::warn!(url, entry = %entry, "ignoring non-string category entry");
            continue;
        };
        if let Some(slug) = normalize_slug(raw, parent) {
            if !slugs.contains(&slug) {
                slugs.push(slug);
            }
        }
    }
    Ok(slugs)
}

/// Reduces a slug or listing URL to the path after `browse/`, minus query,
/// fragment, surrounding slashes, and the parent category prefix.
fn normalize_slug(raw: &str, parent: Option<&str>) -> Option<String> {
    let raw = raw.trim();
    let path = match reqwest::Url::parse(raw) {
        Ok(url) => url.path().to_owned(),
        Err(_) => raw.split(['?', '#']).next().unwrap_or(raw).to_owned(),
    };

    let mut slug = path
        .find(BROWSE_SEGMENT)
        .map_or(path.as_str(), |at| &path[at + BROWSE_SEGMENT.len()..])
        .trim_matches('/');

    if let Some(parent) = parent {
        slug = slug
            .strip_prefix(parent)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(slug);
    }

    let slug = slug.trim_matches('/');
    (!slug.is_empty()).then(|| slug.to_owned())
}
