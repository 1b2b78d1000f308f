use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub datasets_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub images_dir: PathBuf,
    /// Pages visited per category (flat retailers) or per subcategory
    /// (nested retailers). `None` means the walk runs until the site says stop.
    pub max_pages: Option<usize>,
    pub page_load_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub min_page_delay_ms: u64,
    pub max_page_delay_ms: u64,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("datasets_dir", &self.datasets_dir)
            .field("scripts_dir", &self.scripts_dir)
            .field("images_dir", &self.images_dir)
            .field("max_pages", &self.max_pages)
            .field("page_load_timeout_secs", &self.page_load_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("min_page_delay_ms", &self.min_page_delay_ms)
            .field("max_page_delay_ms", &self.max_page_delay_ms)
            .field("headless", &self.headless)
            .field("chrome_path", &self.chrome_path)
            .finish_non_exhaustive()
    }
}
