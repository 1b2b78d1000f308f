//! The browser seam.
//!
//! The crawl engine never touches a DOM. It asks a [`Navigator`] to load a
//! URL, wait for the client-side render, and run one of the retailer's
//! extractor scripts, which hand back JSON. Production uses the Chrome
//! DevTools implementation in the `cdp` module; tests use scripted fakes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::CrawlError;

/// The extractor scripts a retailer ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptId {
    /// Top-level category slugs.
    Categories,
    /// Subcategory listing URLs under the loaded category page.
    SubcategoryUrls,
    /// Total page count of the loaded listing.
    PageCount,
    /// Product records on the loaded listing (plus `nextPage` where the site
    /// paginates by link).
    Products,
    /// Nutrition panel of a loaded product page.
    Nutrition,
}

impl ScriptId {
    pub const ALL: [ScriptId; 5] = [
        ScriptId::Categories,
        ScriptId::SubcategoryUrls,
        ScriptId::PageCount,
        ScriptId::Products,
        ScriptId::Nutrition,
    ];

    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            ScriptId::Categories => "scrape_categories.js",
            ScriptId::SubcategoryUrls => "scrape_subcategory_urls.js",
            ScriptId::PageCount => "get_num_pages.js",
            ScriptId::Products => "scrape_products.js",
            ScriptId::Nutrition => "scrape_nutrition.js",
        }
    }
}

impl std::fmt::Display for ScriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScriptId::Categories => "categories",
            ScriptId::SubcategoryUrls => "subcategory-urls",
            ScriptId::PageCount => "page-count",
            ScriptId::Products => "products",
            ScriptId::Nutrition => "nutrition",
        };
        f.write_str(name)
    }
}

/// An exclusively-owned browser tab.
///
/// Calls are strictly sequential; implementations need not be `Sync`.
/// Timeouts are the navigator's business: `load` and `wait_until_ready`
/// fail once their own deadline passes.
#[allow(async_fn_in_trait)]
pub trait Navigator {
    /// Navigates the tab to `url`.
    async fn load(&mut self, url: &str) -> Result<(), CrawlError>;

    /// Waits until an element matching `selector` is present.
    ///
    /// Returns [`CrawlError::ReadyTimeout`] if it never appears.
    async fn wait_until_ready(&mut self, selector: &str) -> Result<(), CrawlError>;

    /// Runs an extractor script against the loaded page and returns its
    /// decoded JSON result.
    async fn run_extractor(&mut self, script: ScriptId) -> Result<Value, CrawlError>;

    async fn current_url(&mut self) -> Result<String, CrawlError>;
}

impl<N: Navigator> Navigator for &mut N {
    async fn load(&mut self, url: &str) -> Result<(), CrawlError> {
        (**self).load(url).await
    }

    async fn wait_until_ready(&mut self, selector: &str) -> Result<(), CrawlError> {
        (**self).wait_until_ready(selector).await
    }

    async fn run_extractor(&mut self, script: ScriptId) -> Result<Value, CrawlError> {
        (**self).run_extractor(script).await
    }

    async fn current_url(&mut self) -> Result<String, CrawlError> {
        (**self).current_url().await
    }
}

/// Extractor scripts for one retailer, read from `<scripts_dir>/<retailer>/`.
#[derive(Debug, Clone)]
pub struct ScriptLibrary {
    dir: PathBuf,
    scripts: HashMap<ScriptId, String>,
}

impl ScriptLibrary {
    /// Reads every known script present in `dir`. Absent scripts are not an
    /// error here; asking for one later is.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Io`] if a script file exists but cannot be read.
    pub fn load(dir: &Path) -> Result<Self, CrawlError> {
        let mut scripts = HashMap::new();
        for id in ScriptId::ALL {
            let path = dir.join(id.file_name());
            if !path.is_file() {
                continue;
            }
            let source =
                std::fs::read_to_string(&path).map_err(|e| CrawlError::io(&path, e))?;
            scripts.insert(id, source);
        }
        tracing::debug!(dir = %dir.display(), loaded = scripts.len(), "loaded extractor scripts");
        Ok(Self {
            dir: dir.to_path_buf(),
            scripts,
        })
    }

    #[must_use]
    pub fn from_sources(dir: impl Into<PathBuf>, sources: HashMap<ScriptId, String>) -> Self {
        Self {
            dir: dir.into(),
            scripts: sources,
        }
    }

    #[must_use]
    pub fn contains(&self, id: ScriptId) -> bool {
        self.scripts.contains_key(&id)
    }

    /// # Errors
    ///
    /// Returns [`CrawlError::MissingScript`] if the script was not found at load time.
    pub fn get(&self, id: ScriptId) -> Result<&str, CrawlError> {
        self.scripts
            .get(&id)
            .map(String::as_str)
            .ok_or_else(|| CrawlError::MissingScript {
                script: id,
                path: self.dir.join(id.file_name()),
            })
    }
}

/// Extractor scripts hand back either a JSON value or a JSON-encoded string
/// (`return JSON.stringify(...)`). Both decode to the same value; a string
/// that is not JSON is kept as a plain string.
#[must_use]
pub fn decode_script_output(raw: Value) -> Value {
    match raw {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_json_encoded_strings() {
        let raw = Value::String(r#"{"products": [], "nextPage": "NONE"}"#.to_owned());
        assert_eq!(
            decode_script_output(raw),
            json!({"products": [], "nextPage": "NONE"})
        );
    }

    #[test]
    fn passes_structured_values_through() {
        assert_eq!(decode_script_output(json!([1, 2])), json!([1, 2]));
        assert_eq!(decode_script_output(json!(7)), json!(7));
    }

    #[test]
    fn keeps_non_json_strings() {
        assert_eq!(
            decode_script_output(Value::String("NONE".to_owned())),
            json!("NONE")
        );
    }

    #[test]
    fn missing_script_reports_expected_path() {
        let lib = ScriptLibrary::from_sources("/scripts/coles", HashMap::new());
        let err = lib.get(ScriptId::PageCount).unwrap_err();
        match err {
            CrawlError::MissingScript { script, path } => {
                assert_eq!(script, ScriptId::PageCount);
                assert_eq!(path, PathBuf::from("/scripts/coles/get_num_pages.js"));
            }
            other => panic!("expected MissingScript, got {other:?}"),
        }
    }

    #[test]
    fn load_reads_present_scripts_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scrape_products.js"), "return '[]';").unwrap();

        let lib = ScriptLibrary::load(dir.path()).unwrap();
        assert!(lib.contains(ScriptId::Products));
        assert!(!lib.contains(ScriptId::Categories));
        assert_eq!(lib.get(ScriptId::Products).unwrap(), "return '[]';");
    }
}
