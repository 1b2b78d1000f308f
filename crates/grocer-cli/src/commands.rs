//! Subcommand handlers.
//!
//! Each handler owns its browser for the duration of the command and closes
//! it before returning, whether or not the crawl succeeded.

use anyhow::Context;
use grocer_core::{AppConfig, Category, Retailer};
use grocer_crawler::{
    CdpNavigator, CrawlDriver, CrawlOptions, DatasetStore, Enricher, ImageDownloader,
    NutritionFetcher, PaginationStrategy, SamplingCap, ScriptId, ScriptLibrary, SiteProfile,
};

#[derive(Debug)]
pub(crate) struct CrawlArgs {
    pub retailer: Retailer,
    pub max_pages: Option<usize>,
    pub categories: Vec<String>,
    pub nutrition: bool,
    pub save_images: bool,
}

/// Scripts a crawl will call, given the retailer's layout and the options.
fn required_scripts(profile: &SiteProfile, args: &CrawlArgs) -> Vec<ScriptId> {
    let mut required = vec![ScriptId::Products];
    if args.categories.is_empty() {
        required.push(ScriptId::Categories);
    }
    if profile.nested {
        required.push(ScriptId::SubcategoryUrls);
    }
    if profile.pagination == PaginationStrategy::TotalCount {
        required.push(ScriptId::PageCount);
    }
    if args.nutrition {
        required.push(ScriptId::Nutrition);
    }
    required
}

fn load_scripts(config: &AppConfig, retailer: Retailer, required: &[ScriptId]) -> anyhow::Result<ScriptLibrary> {
    let dir = config.scripts_dir.join(retailer.slug());
    let scripts = ScriptLibrary::load(&dir)
        .with_context(|| format!("failed to read extractor scripts from {}", dir.display()))?;
    for &id in required {
        scripts.get(id)?;
    }
    Ok(scripts)
}

fn sampling_cap(config: &AppConfig, override_pages: Option<usize>) -> SamplingCap {
    match override_pages {
        Some(0) => SamplingCap::UNBOUNDED,
        Some(n) => SamplingCap::new(Some(n)),
        None => SamplingCap::new(config.max_pages),
    }
}

/// Crawls a retailer and prints the end-of-run summary.
///
/// # Errors
///
/// Returns an error if the scripts are missing, the browser cannot start, or
/// category discovery fails. Category and page failures only show up in the
/// summary.
pub(crate) async fn run_crawl(config: &AppConfig, args: CrawlArgs) -> anyhow::Result<()> {
    let profile = SiteProfile::for_retailer(args.retailer);
    let scripts = load_scripts(config, args.retailer, &required_scripts(&profile, &args))?;

    let mut options = CrawlOptions::from_config(config);
    options.cap = sampling_cap(config, args.max_pages);

    let nutrition = args
        .nutrition
        .then(|| NutritionFetcher::new(options.retry));
    let images = if args.save_images {
        Some(ImageDownloader::new(
            &config.images_dir,
            config.page_load_timeout_secs,
            &config.user_agent,
        )?)
    } else {
        None
    };

    tracing::info!(
        retailer = %args.retailer,
        max_pages = ?options.cap.max_pages(),
        categories = args.categories.len(),
        nutrition = args.nutrition,
        save_images = args.save_images,
        "starting crawl"
    );

    let nav = CdpNavigator::launch(config, scripts).await?;
    let mut driver = CrawlDriver::new(
        nav,
        args.retailer,
        DatasetStore::new(&config.datasets_dir),
        options,
    )
    .with_enricher(Enricher::new(nutrition, images).with_delay(options.delay));

    let result = if args.categories.is_empty() {
        driver.run().await
    } else {
        let chosen = args.categories.into_iter().map(Category::new).collect();
        Ok(driver.crawl_categories(chosen).await)
    };
    driver.into_navigator().close().await;

    let summary = result.context("category discovery failed")?;
    print!("{summary}");
    Ok(())
}

/// Prints the retailer's top-level category slugs, one per line.
///
/// # Errors
///
/// Returns an error if the script is missing, the browser cannot start, or
/// discovery fails.
pub(crate) async fn run_categories(config: &AppConfig, retailer: Retailer) -> anyhow::Result<()> {
    let scripts = load_scripts(config, retailer, &[ScriptId::Categories])?;
    let nav = CdpNavigator::launch(config, scripts).await?;
    let mut driver = CrawlDriver::new(
        nav,
        retailer,
        DatasetStore::new(&config.datasets_dir),
        CrawlOptions::from_config(config),
    );

    let result = driver.discover().await;
    driver.into_navigator().close().await;

    for category in result.context("category discovery failed")? {
        println!("{category}");
    }
    Ok(())
}

/// Writes `combined.json` for a retailer from its existing category files.
///
/// # Errors
///
/// Returns an error if the dataset directory or one of its files cannot be
/// read, or the combined file cannot be written.
pub(crate) fn run_combine(config: &AppConfig, retailer: Retailer) -> anyhow::Result<()> {
    let report = DatasetStore::new(&config.datasets_dir).combine(retailer)?;
    println!(
        "combined {} records from {} files into {}",
        report.records,
        report.files,
        report.path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(retailer: Retailer) -> CrawlArgs {
        CrawlArgs {
            retailer,
            max_pages: None,
            categories: Vec::new(),
            nutrition: false,
            save_images: false,
        }
    }

    #[test]
    fn coles_needs_subcategory_and_page_count_scripts() {
        let profile = SiteProfile::for_retailer(Retailer::Coles);
        let required = required_scripts(&profile, &args(Retailer::Coles));
        assert!(required.contains(&ScriptId::SubcategoryUrls));
        assert!(required.contains(&ScriptId::PageCount));
        assert!(!required.contains(&ScriptId::Nutrition));
    }

    #[test]
    fn chosen_categories_skip_the_categories_script() {
        let profile = SiteProfile::for_retailer(Retailer::Woolworths);
        let mut crawl = args(Retailer::Woolworths);
        crawl.categories = vec!["bakery".to_owned()];
        crawl.nutrition = true;

        let required = required_scripts(&profile, &crawl);
        assert_eq!(required, vec![ScriptId::Products, ScriptId::Nutrition]);
    }

    #[test]
    fn zero_max_pages_lifts_the_cap() {
        let config = test_config();
        assert_eq!(sampling_cap(&config, Some(0)), SamplingCap::UNBOUNDED);
        assert_eq!(sampling_cap(&config, Some(3)).max_pages(), Some(3));
        assert_eq!(sampling_cap(&config, None).max_pages(), config.max_pages);
    }

    #[test]
    fn missing_scripts_are_reported_before_launch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("coles")).unwrap();
        let mut config = test_config();
        config.scripts_dir = dir.path().to_path_buf();

        let err = load_scripts(&config, Retailer::Coles, &[ScriptId::Products]).unwrap_err();
        assert!(err.to_string().contains("scrape_products.js"), "got: {err}");
    }

    fn test_config() -> AppConfig {
        grocer_core::load_app_config_from_env().unwrap()
    }
}
