//! Crawl data model: categories, subcategories, and the product records the
//! extractor scripts hand back.
//!
//! ## Record shape
//!
//! Each retailer's extractor returns its own field set. Records are therefore
//! kept as JSON objects rather than a fixed struct, so fields the crawler does
//! not know about pass through to the dataset files untouched. The accessors
//! below read the fields the crawler itself relies on:
//!
//! | field | meaning |
//! |---|---|
//! | `name` | product name |
//! | `price` / `special` | shelf price / discounted price; either may be absent |
//! | `url` (or `href`) | canonical product URL, the deduplication key |
//! | `imgSrc` (or `image`) | product image URL |
//! | `category` / `subcategory` | provenance, stamped by the crawler |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FIELD_NAME: &str = "name";
pub const FIELD_PRICE: &str = "price";
pub const FIELD_SPECIAL: &str = "special";
pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_SUBCATEGORY: &str = "subcategory";
pub const FIELD_NUTRITION: &str = "nutrition";

const URL_FIELDS: [&str; 2] = ["url", "href"];
const IMAGE_FIELDS: [&str; 2] = ["imgSrc", "image"];
const IMAGE_NAME_FIELD: &str = "imgName";

/// A top-level retailer category, identified by its URL slug
/// (e.g. `"fruit-veg"`, `"dairy-eggs-fridge/milk"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub slug: String,
    /// Present only for retailers with a second level, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategories: Option<Vec<Subcategory>>,
}

impl Category {
    #[must_use]
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            subcategories: None,
        }
    }

    #[must_use]
    pub fn with_subcategories(mut self, subcategories: Vec<Subcategory>) -> Self {
        self.subcategories = Some(subcategories);
        self
    }

    /// Filename-safe form of the slug. Nested slugs contain `/`, which
    /// becomes `-`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.slug.replace('/', "-")
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.slug)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    pub slug: String,
    /// First listing page of this subcategory.
    pub entry_url: String,
}

/// One product as returned by an extractor script, plus crawler provenance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRecord(Map<String, Value>);

impl ProductRecord {
    /// Wraps a JSON value as a record. Only objects qualify; anything else
    /// is returned unchanged as the error.
    ///
    /// # Errors
    ///
    /// Returns the original value when it is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_field(FIELD_NAME)
    }

    #[must_use]
    pub fn price(&self) -> Option<&Value> {
        self.present(FIELD_PRICE)
    }

    #[must_use]
    pub fn special(&self) -> Option<&Value> {
        self.present(FIELD_SPECIAL)
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.str_field(FIELD_CATEGORY)
    }

    #[must_use]
    pub fn subcategory(&self) -> Option<&str> {
        self.str_field(FIELD_SUBCATEGORY)
    }

    /// Canonical product URL, if the extractor supplied a non-empty one.
    #[must_use]
    pub fn product_url(&self) -> Option<&str> {
        URL_FIELDS.iter().find_map(|field| self.str_field(field))
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        IMAGE_FIELDS.iter().find_map(|field| self.str_field(field))
    }

    /// Filename the extractor suggested for the product image.
    #[must_use]
    pub fn image_name(&self) -> Option<&str> {
        self.str_field(IMAGE_NAME_FIELD)
    }

    /// Stamps crawler provenance, replacing anything the extractor put there.
    pub fn set_provenance(&mut self, category: &str, subcategory: Option<&str>) {
        self.insert(FIELD_CATEGORY, Value::String(category.to_owned()));
        match subcategory {
            Some(sub) => self.insert(FIELD_SUBCATEGORY, Value::String(sub.to_owned())),
            None => {
                self.0.remove(FIELD_SUBCATEGORY);
            }
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn present(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> ProductRecord {
        ProductRecord::from_value(value).expect("fixture must be an object")
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(ProductRecord::from_value(json!("milk")).is_err());
        assert!(ProductRecord::from_value(json!([1, 2])).is_err());
        assert!(ProductRecord::from_value(Value::Null).is_err());
    }

    #[test]
    fn product_url_prefers_url_then_href() {
        let r = record(json!({"url": "https://a/1", "href": "https://a/2"}));
        assert_eq!(r.product_url(), Some("https://a/1"));

        let r = record(json!({"href": "https://a/2"}));
        assert_eq!(r.product_url(), Some("https://a/2"));

        let r = record(json!({"url": "   ", "href": ""}));
        assert_eq!(r.product_url(), None);
    }

    #[test]
    fn missing_prices_stay_missing() {
        let r = record(json!({"name": "Loose Carrots"}));
        assert!(r.price().is_none());
        assert!(r.special().is_none());

        let r = record(json!({"name": "Brie", "price": null, "special": 4.5}));
        assert!(r.price().is_none());
        assert_eq!(r.special(), Some(&json!(4.5)));
    }

    #[test]
    fn set_provenance_overwrites_extractor_values() {
        let mut r = record(json!({"name": "Milk", "category": "bogus", "subcategory": "x"}));
        r.set_provenance("dairy", None);
        assert_eq!(r.category(), Some("dairy"));
        assert_eq!(r.subcategory(), None);

        r.set_provenance("dairy", Some("milk"));
        assert_eq!(r.subcategory(), Some("milk"));
    }

    #[test]
    fn file_stem_replaces_slashes() {
        let c = Category::new("dairy-eggs-fridge/milk");
        assert_eq!(c.file_stem(), "dairy-eggs-fridge-milk");
    }

    #[test]
    fn record_serializes_as_plain_object() {
        let r = record(json!({"name": "Eggs", "price": 6}));
        let text = serde_json::to_string(&r).unwrap();
        assert_eq!(text, r#"{"name":"Eggs","price":6}"#);
    }
}
