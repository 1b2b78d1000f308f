//! Optional per-product enrichment: nutrition panels and product images.
//!
//! Both are best-effort. A product whose enrichment fails keeps the fields
//! its listing page gave it and the page is ingested as usual.

use std::path::{Path, PathBuf};
use std::time::Duration;

use grocer_core::products::FIELD_NUTRITION;
use grocer_core::ProductRecord;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::CrawlError;
use crate::extract::PageResult;
use crate::navigator::{Navigator, ScriptId};
use crate::retry::RetryPolicy;
use crate::walker::PageDelay;

const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

/// Counts for one enriched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnrichStats {
    pub nutrition: usize,
    pub images: usize,
    pub failures: usize,
}

/// Loads each product's own page and attaches the nutrition script's result.
#[derive(Debug, Clone)]
pub struct NutritionFetcher {
    retry: RetryPolicy,
}

impl NutritionFetcher {
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// # Errors
    ///
    /// Returns the last navigation or script error once retries are spent.
    pub async fn fetch<N: Navigator>(&self, nav: &mut N, product_url: &str) -> Result<Value, CrawlError> {
        let output = self
            .retry
            .run(nav, product_url, |nav| {
                let url = product_url.to_owned();
                Box::pin(async move {
                    nav.load(&url).await?;
                    nav.run_extractor(ScriptId::Nutrition).await
                })
            })
            .await?;

        // Scripts either return the panel or wrap it as `{"nutrition": {...}}`.
        Ok(match output {
            Value::Object(mut map) if map.contains_key(FIELD_NUTRITION) => map
                .remove(FIELD_NUTRITION)
                .unwrap_or(Value::Null),
            other => other,
        })
    }
}

/// Downloads product images into a flat directory.
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    client: reqwest::Client,
    dir: PathBuf,
}

impl ImageDownloader {
    /// # Errors
    ///
    /// Returns [`CrawlError::Http`] if the HTTP client cannot be built.
    pub fn new(dir: impl Into<PathBuf>, timeout_secs: u64, user_agent: &str) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            dir: dir.into(),
        })
    }

    /// Saves `record`'s image, unless it has none or the file already exists.
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::HttpStatus`] for a non-2xx response,
    /// [`CrawlError::Http`] for transport failures and [`CrawlError::Io`] if the
    /// file cannot be written.
    pub async fn download(&self, record: &ProductRecord) -> Result<Option<PathBuf>, CrawlError> {
        let Some(url) = record.image_url() else {
            return Ok(None);
        };
        let path = self.dir.join(image_file_name(url, record.image_name()));
        if path.exists() {
            tracing::debug!(path = %path.display(), "image already saved");
            return Ok(None);
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::HttpStatus {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CrawlError::io(&self.dir, e))?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| CrawlError::io(&path, e))?;
        Ok(Some(path))
    }
}

/// File name for a product image: the extractor's suggested name when it has
/// one, otherwise a hash of the image URL with the URL's extension.
fn image_file_name(url: &str, suggested: Option<&str>) -> String {
    let extension = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase)
        })
        .filter(|ext| !ext.is_empty() && ext.len() <= 5)
        .unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_owned());

    if let Some(name) = suggested.map(sanitize_file_name).filter(|n| !n.is_empty()) {
        if Path::new(&name).extension().is_some() {
            return name;
        }
        return format!("{name}.{extension}");
    }

    format!("{:x}.{extension}", Sha256::digest(url.as_bytes()))
}

fn sanitize_file_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('.')
        .to_owned()
}

/// The enrichment steps enabled for a run.
#[derive(Debug, Clone, Default)]
pub struct Enricher {
    nutrition: Option<NutritionFetcher>,
    images: Option<ImageDownloader>,
    delay: PageDelay,
}

impl Enricher {
    #[must_use]
    pub fn new(nutrition: Option<NutritionFetcher>, images: Option<ImageDownloader>) -> Self {
        Self {
            nutrition,
            images,
            delay: PageDelay::NONE,
        }
    }

    /// Pause before each product's requests, like between listing pages.
    #[must_use]
    pub fn with_delay(mut self, delay: PageDelay) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.nutrition.is_some() || self.images.is_some()
    }

    /// Enriches every record on `page` in place.
    pub async fn enrich_page<N: Navigator>(&self, nav: &mut N, page: &mut PageResult) -> EnrichStats {
        let mut stats = EnrichStats::default();
        if !self.is_enabled() {
            return stats;
        }

        for record in &mut page.records {
            let fetches_page = self.nutrition.is_some() && record.product_url().is_some();
            let fetches_image = self.images.is_some() && record.image_url().is_some();
            if !fetches_page && !fetches_image {
                continue;
            }
            self.delay.pause().await;

            if let Some(fetcher) = &self.nutrition {
                if let Some(url) = record.product_url().map(str::to_owned) {
                    match fetcher.fetch(nav, &url).await {
                        Ok(nutrition) => {
                            record.insert(FIELD_NUTRITION, nutrition);
                            stats.nutrition += 1;
                        }
                        Err(e) => {
                            stats.failures += 1;
                            tracing::warn!(product = %url, error = %e, "nutrition lookup failed");
                        }
                    }
                }
            }

            if let Some(images) = &self.images {
                match images.download(record).await {
                    Ok(Some(_)) => stats.images += 1,
                    Ok(None) => {}
                    Err(e) => {
                        stats.failures += 1;
                        tracing::warn!(
                            image = record.image_url().unwrap_or_default(),
                            error = %e,
                            "image download failed"
                        );
                    }
                }
            }
        }

        tracing::debug!(
            url = %page.url,
            nutrition = stats.nutrition,
            images = stats.images,
            failures = stats.failures,
            "page enriched"
        );
        stats
    }
}
