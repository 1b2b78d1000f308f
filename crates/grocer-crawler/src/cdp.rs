//! Chrome DevTools navigator.
//!
//! Launches one Chrome instance with a single tab and drives it over CDP.
//! Extractor scripts are function bodies (they end in `return ...`), so each
//! is wrapped in an immediately-invoked function before evaluation.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use grocer_core::AppConfig;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::CrawlError;
use crate::navigator::{decode_script_output, Navigator, ScriptId, ScriptLibrary};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct CdpNavigator {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    scripts: ScriptLibrary,
    ready_timeout: Duration,
}

impl CdpNavigator {
    /// Launches Chrome as configured and opens a blank tab.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Browser`] if Chrome cannot be configured,
    /// launched, or asked for a tab.
    pub async fn launch(config: &AppConfig, scripts: ScriptLibrary) -> Result<Self, CrawlError> {
        let ready_timeout = Duration::from_secs(config.page_load_timeout_secs);

        let mut builder = BrowserConfig::builder()
            .window_size(1280, 1024)
            .request_timeout(ready_timeout)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", config.user_agent));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(CrawlError::Browser)?;

        let (browser, mut events) = Browser::launch(browser_config)
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to launch Chrome: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to open tab: {e}")))?;

        tracing::info!(headless = config.headless, "browser launched");
        Ok(Self {
            browser,
            page,
            handler,
            scripts,
            ready_timeout,
        })
    }

    /// Closes the browser and stops its event handler.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "failed to close browser cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "browser process wait failed");
        }
        self.handler.abort();
    }

    fn ready_timeout_ms(&self) -> u64 {
        u64::try_from(self.ready_timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Navigator for CdpNavigator {
    async fn load(&mut self, url: &str) -> Result<(), CrawlError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| CrawlError::Navigation {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    async fn wait_until_ready(&mut self, selector: &str) -> Result<(), CrawlError> {
        let page = &self.page;
        let poll = async {
            loop {
                if page.find_element(selector).await.is_ok() {
                    return;
                }
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(self.ready_timeout, poll)
            .await
            .map_err(|_| CrawlError::ReadyTimeout {
                selector: selector.to_owned(),
                timeout_ms: self.ready_timeout_ms(),
            })
    }

    async fn run_extractor(&mut self, script: ScriptId) -> Result<Value, CrawlError> {
        let body = self.scripts.get(script)?;
        let expression = format!("(function() {{\n{body}\n}})()");

        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| CrawlError::Script {
                script,
                reason: match e {
                    CdpError::JavascriptException(details) => details.text.clone(),
                    other => other.to_string(),
                },
            })?;

        // `undefined` has no JSON form; treat it like `null`.
        let raw = result.into_value::<Value>().unwrap_or(Value::Null);
        Ok(decode_script_output(raw))
    }

    async fn current_url(&mut self) -> Result<String, CrawlError> {
        self.page
            .url()
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to read page URL: {e}")))?
            .ok_or_else(|| CrawlError::Browser("page has no URL".to_owned()))
    }
}
