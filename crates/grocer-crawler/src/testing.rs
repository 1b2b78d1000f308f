//! In-memory navigator for unit tests: canned extractor output per URL, with
//! optional scripted load failures.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::CrawlError;
use crate::navigator::{Navigator, ScriptId};

#[derive(Debug, Default)]
struct FakePage {
    outputs: HashMap<ScriptId, Value>,
    never_ready: bool,
}

#[derive(Debug, Default)]
pub(crate) struct FakeNavigator {
    pages: HashMap<String, FakePage>,
    failing_loads: HashMap<String, u32>,
    current: Option<String>,
    pub loads: Vec<String>,
}

impl FakeNavigator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(mut self, url: &str, script: ScriptId, output: Value) -> Self {
        self.pages
            .entry(url.to_owned())
            .or_default()
            .outputs
            .insert(script, output);
        self
    }

    /// The next `times` loads of `url` fail with a navigation error.
    pub(crate) fn fail_loads(mut self, url: &str, times: u32) -> Self {
        self.failing_loads.insert(url.to_owned(), times);
        self
    }

    pub(crate) fn never_ready(mut self, url: &str) -> Self {
        self.pages.entry(url.to_owned()).or_default().never_ready = true;
        self
    }

    pub(crate) fn load_count(&self, url: &str) -> usize {
        self.loads.iter().filter(|u| *u == url).count()
    }
}

impl Navigator for FakeNavigator {
    async fn load(&mut self, url: &str) -> Result<(), CrawlError> {
        self.loads.push(url.to_owned());
        if let Some(remaining) = self.failing_loads.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CrawlError::Navigation {
                    url: url.to_owned(),
                    reason: "net::ERR_CONNECTION_RESET".to_owned(),
                });
            }
        }
        if !self.pages.contains_key(url) {
            return Err(CrawlError::Navigation {
                url: url.to_owned(),
                reason: "404".to_owned(),
            });
        }
        self.current = Some(url.to_owned());
        Ok(())
    }

    async fn wait_until_ready(&mut self, selector: &str) -> Result<(), CrawlError> {
        let never_ready = self
            .current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .is_some_and(|page| page.never_ready);
        if never_ready {
            return Err(CrawlError::ReadyTimeout {
                selector: selector.to_owned(),
                timeout_ms: 10,
            });
        }
        Ok(())
    }

    async fn run_extractor(&mut self, script: ScriptId) -> Result<Value, CrawlError> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .and_then(|page| page.outputs.get(&script))
            .cloned()
            .ok_or_else(|| CrawlError::Script {
                script,
                reason: "Cannot read properties of null".to_owned(),
            })
    }

    async fn current_url(&mut self) -> Result<String, CrawlError> {
        self.current.clone().ok_or_else(|| CrawlError::Navigation {
            url: "about:blank".to_owned(),
            reason: "no page loaded".to_owned(),
        })
    }
}
