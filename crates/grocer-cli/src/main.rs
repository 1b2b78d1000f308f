use clap::{Parser, Subcommand};
use grocer_core::Retailer;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "grocer")]
#[command(about = "Crawl supermarket catalogues into per-category JSON datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl a retailer's categories and write their datasets.
    Crawl {
        #[arg(long)]
        retailer: Retailer,
        /// Pages per category or subcategory; 0 means no limit.
        #[arg(long)]
        max_pages: Option<usize>,
        /// Crawl only these category slugs instead of discovering them.
        #[arg(long = "category", value_name = "SLUG")]
        categories: Vec<String>,
        /// Visit each product page and record its nutrition panel.
        #[arg(long)]
        nutrition: bool,
        /// Download product images into the images directory.
        #[arg(long)]
        save_images: bool,
    },
    /// List a retailer's categories without crawling them.
    Categories {
        #[arg(long)]
        retailer: Retailer,
    },
    /// Merge a retailer's category datasets into `combined.json`.
    Combine {
        #[arg(long)]
        retailer: Retailer,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = grocer_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Crawl {
            retailer,
            max_pages,
            categories,
            nutrition,
            save_images,
        } => {
            let args = commands::CrawlArgs {
                retailer,
                max_pages,
                categories,
                nutrition,
                save_images,
            };
            commands::run_crawl(&config, args).await
        }
        Commands::Categories { retailer } => commands::run_categories(&config, retailer).await,
        Commands::Combine { retailer } => commands::run_combine(&config, retailer),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn crawl_accepts_repeated_categories() {
        let cli = Cli::try_parse_from([
            "grocer",
            "crawl",
            "--retailer",
            "Coles",
            "--max-pages",
            "0",
            "--category",
            "dairy",
            "--category",
            "bakery",
            "--nutrition",
        ])
        .unwrap();

        match cli.command {
            Commands::Crawl {
                retailer,
                max_pages,
                categories,
                nutrition,
                save_images,
            } => {
                assert_eq!(retailer, Retailer::Coles);
                assert_eq!(max_pages, Some(0));
                assert_eq!(categories, vec!["dairy", "bakery"]);
                assert!(nutrition);
                assert!(!save_images);
            }
            other => panic!("expected crawl, got {other:?}"),
        }
    }

    #[test]
    fn unknown_retailer_is_rejected() {
        assert!(Cli::try_parse_from(["grocer", "combine", "--retailer", "aldi"]).is_err());
    }
}
