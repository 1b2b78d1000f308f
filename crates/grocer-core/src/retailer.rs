use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// The supermarkets the crawler knows how to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retailer {
    Coles,
    Woolworths,
}

impl Retailer {
    pub const ALL: [Retailer; 2] = [Retailer::Coles, Retailer::Woolworths];

    /// Lower-case identifier used on the command line and for script directories.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Retailer::Coles => "coles",
            Retailer::Woolworths => "woolworths",
        }
    }

    /// Display name; also the dataset sub-directory the analysis step reads from.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Retailer::Coles => "Coles",
            Retailer::Woolworths => "Woolworths",
        }
    }

    /// Prefix that category slugs are appended to when building listing URLs.
    #[must_use]
    pub fn browse_base_url(self) -> &'static str {
        match self {
            Retailer::Coles => "https://shop.coles.com.au/a/a-national/everything/browse/",
            Retailer::Woolworths => "https://www.woolworths.com.au/shop/browse/",
        }
    }

    /// Page the category list is scraped from.
    #[must_use]
    pub fn categories_url(self) -> &'static str {
        match self {
            Retailer::Coles => self.browse_base_url(),
            Retailer::Woolworths => "https://www.woolworths.com.au",
        }
    }
}

impl std::fmt::Display for Retailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Retailer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Retailer::ALL
            .into_iter()
            .find(|r| r.slug() == needle)
            .ok_or_else(|| ConfigError::UnknownRetailer(s.to_string()))
    }
}
