//! Dataset files on disk.
//!
//! Layout: `<root>/<Retailer>/<category>.json`, each a JSON array of product
//! objects with sorted keys and 4-space indentation. The price-comparison
//! step reads these files (or the `combined.json` produced by
//! [`DatasetStore::combine`]) directly, so the format is fixed.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use grocer_core::{Category, ProductRecord, Retailer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CrawlError;

pub const COMBINED_FILE: &str = "combined.json";

#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: PathBuf,
}

/// Result of [`DatasetStore::combine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineReport {
    pub path: PathBuf,
    pub files: usize,
    pub records: usize,
}

impl DatasetStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn retailer_dir(&self, retailer: Retailer) -> PathBuf {
        self.root.join(retailer.display_name())
    }

    #[must_use]
    pub fn path_for(&self, retailer: Retailer, category: &Category) -> PathBuf {
        self.retailer_dir(retailer)
            .join(format!("{}.json", category.file_stem()))
    }

    /// Concatenates every category file of `retailer` into `combined.json`,
    /// in filename order. An existing `combined.json` is not read back in.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Io`] or [`CrawlError::Deserialize`] for the first
    /// unreadable file.
    pub fn combine(&self, retailer: Retailer) -> Result<CombineReport, CrawlError> {
        let dir = self.retailer_dir(retailer);
        let entries = fs::read_dir(&dir).map_err(|e| CrawlError::io(&dir, e))?;

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| CrawlError::io(&dir, e))?.path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            let is_combined = path.file_name().is_some_and(|name| name == COMBINED_FILE);
            if is_json && !is_combined && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut combined: Vec<ProductRecord> = Vec::new();
        for file in &files {
            combined.extend(read_records(file)?);
        }

        let path = dir.join(COMBINED_FILE);
        write_records(&path, &combined)?;
        tracing::info!(
            retailer = %retailer,
            files = files.len(),
            records = combined.len(),
            path = %path.display(),
            "combined datasets"
        );

        Ok(CombineReport {
            path,
            files: files.len(),
            records: combined.len(),
        })
    }
}

/// Reads a dataset file.
///
/// # Errors
///
/// Returns [`CrawlError::Io`] if the file cannot be read and
/// [`CrawlError::Deserialize`] if it is not an array of objects.
pub fn read_records(path: &Path) -> Result<Vec<ProductRecord>, CrawlError> {
    let text = fs::read_to_string(path).map_err(|e| CrawlError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| CrawlError::Deserialize {
        context: path.display().to_string(),
        source: e,
    })
}

/// Writes `records` to `path` through a temporary sibling and a rename, so a
/// crash mid-write leaves the previous version intact.
///
/// # Errors
///
/// Returns [`CrawlError::Io`] on any filesystem failure.
pub fn write_records(path: &Path, records: &[ProductRecord]) -> Result<(), CrawlError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CrawlError::io(parent, e))?;
    }

    let document = Value::Array(
        records
            .iter()
            .map(|record| sort_keys(&record.clone().into_value()))
            .collect(),
    );

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document
        .serialize(&mut serializer)
        .map_err(|e| CrawlError::io(path, std::io::Error::other(e)))?;

    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).map_err(|e| CrawlError::io(&tmp, e))?;
    file.write_all(&buf).map_err(|e| CrawlError::io(&tmp, e))?;
    file.sync_all().map_err(|e| CrawlError::io(&tmp, e))?;
    drop(file);
    fs::rename(&tmp, path).map_err(|e| CrawlError::io(path, e))
}

/// Rebuilds objects with keys inserted in sorted order, recursively, so the
/// output is sorted whatever map ordering `serde_json` was built with.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> ProductRecord {
        ProductRecord::from_value(value).unwrap()
    }

    #[test]
    fn path_is_derived_from_retailer_and_category() {
        let store = DatasetStore::new("/data");
        assert_eq!(
            store.path_for(Retailer::Woolworths, &Category::new("drinks/soft-drinks")),
            PathBuf::from("/data/Woolworths/drinks-soft-drinks.json")
        );
        assert_eq!(
            store.path_for(Retailer::Coles, &Category::new("dairy")),
            PathBuf::from("/data/Coles/dairy.json")
        );
    }

    #[test]
    fn written_file_has_sorted_keys_and_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Coles").join("dairy.json");

        write_records(&path, &[record(json!({"price": 3.1, "name": "Milk"}))]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "[\n    {\n        \"name\": \"Milk\",\n        \"price\": 3.1\n    }\n]"
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn empty_dataset_is_an_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        write_records(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
        assert!(read_records(&path).unwrap().is_empty());
    }

    #[test]
    fn read_rejects_non_array_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"name": "Milk"}"#).unwrap();
        assert!(matches!(
            read_records(&path),
            Err(CrawlError::Deserialize { .. })
        ));
    }

    #[test]
    fn combine_concatenates_category_files_and_skips_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        let coles = store.retailer_dir(Retailer::Coles);

        write_records(&coles.join("bakery.json"), &[record(json!({"name": "Loaf"}))]).unwrap();
        write_records(
            &coles.join("dairy.json"),
            &[record(json!({"name": "Milk"})), record(json!({"name": "Brie"}))],
        )
        .unwrap();
        write_records(&coles.join(COMBINED_FILE), &[record(json!({"name": "stale"}))]).unwrap();
        fs::write(coles.join("notes.txt"), "not a dataset").unwrap();

        let report = store.combine(Retailer::Coles).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.records, 3);

        let names: Vec<String> = read_records(&report.path)
            .unwrap()
            .iter()
            .map(|r| r.name().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["Loaf", "Milk", "Brie"]);
    }

    #[test]
    fn combine_without_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path());
        assert!(matches!(
            store.combine(Retailer::Woolworths),
            Err(CrawlError::Io { .. })
        ));
    }
}
