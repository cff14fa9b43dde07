use std::{collections::HashSet, path::Path};

use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    model::Item,
};

/// A validated catalog record.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub item: Item,
    /// Free-text keywords; only used to enrich the embedding text.
    pub keywords: Option<String>,
}

impl CatalogEntry {
    pub fn document_text(&self) -> String {
        self.item.document_text(self.keywords.as_deref())
    }
}

/// Load and validate the catalog at `path`.
///
/// The file must be a non-empty JSON array of objects. Invalid records and
/// records repeating an earlier `url` are logged and skipped; a missing file, a malformed document, an empty array,
/// or an array with no valid record at all is a [`Error::DataLoad`].
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let data_load = |reason: String| Error::DataLoad {
        path: path.to_path_buf(),
        reason,
    };

    let raw = std::fs::read_to_string(path)
        .map_err(|e| data_load(format!("cannot read file: {e}")))?;
    let records: Vec<Value> = serde_json::from_str(&raw)
        .map_err(|e| data_load(format!("expected a JSON array: {e}")))?;

    if records.is_empty() {
        return Err(data_load("no assessments found".into()));
    }

    let total = records.len();
    let validated: Vec<Result<CatalogEntry>> = records
        .par_iter()
        .enumerate()
        .map(|(index, record)| validate_record(index, record))
        .collect();

    let mut entries = Vec::with_capacity(total);
    let mut seen: HashSet<String> = HashSet::with_capacity(total);
    for (index, result) in validated.into_iter().enumerate() {
        let checked = result.and_then(|entry| {
            if seen.insert(entry.item.url.clone()) {
                Ok(entry)
            } else {
                Err(Error::RecordValidation {
                    index,
                    reason: format!("duplicate url '{}'", entry.item.url),
                })
            }
        });
        match checked {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("skipping catalog record: {e}"),
        }
    }

    if entries.is_empty() {
        return Err(data_load(format!("none of {total} records are valid")));
    }

    info!(
        valid = entries.len(),
        skipped = total - entries.len(),
        "loaded catalog"
    );
    Ok(entries)
}

/// Check one raw catalog record against the item schema.
pub fn validate_record(index: usize, record: &Value) -> Result<CatalogEntry> {
    let invalid = |reason: String| Error::RecordValidation { index, reason };

    let obj = record
        .as_object()
        .ok_or_else(|| invalid("record is not an object".into()))?;

    let url = required_str(obj, "url").map_err(invalid)?;
    if url.trim().is_empty() {
        return Err(invalid("field 'url' is empty".into()));
    }

    let name = match obj.get("name") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(invalid("field 'name' must be a string".into())),
    };

    let test_type = match obj.get("test_type") {
        Some(Value::Array(tags)) => tags
            .iter()
            .map(|t| t.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                invalid("field 'test_type' must contain only strings".into())
            })?,
        Some(_) => {
            return Err(invalid("field 'test_type' must be an array".into()));
        }
        None => return Err(invalid("missing field 'test_type'".into())),
    };

    let keywords = match obj.get("keywords") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    };

    Ok(CatalogEntry {
        item: Item {
            url,
            name,
            description: required_str(obj, "description").map_err(invalid)?,
            duration: required_str(obj, "duration").map_err(invalid)?,
            remote_support: required_bool(obj, "remote_support")
                .map_err(invalid)?,
            adaptive_support: required_bool(obj, "adaptive_support")
                .map_err(invalid)?,
            test_type,
        },
        keywords,
    })
}

fn required_str(
    obj: &Map<String, Value>,
    field: &str,
) -> std::result::Result<String, String> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(format!("field '{field}' must be a string")),
        None => Err(format!("missing field '{field}'")),
    }
}

fn required_bool(
    obj: &Map<String, Value>,
    field: &str,
) -> std::result::Result<bool, String> {
    match obj.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(format!("field '{field}' must be a boolean")),
        None => Err(format!("missing field '{field}'")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn valid_record() -> Value {
        json!({
            "url": "https://example.com/verify-numerical",
            "name": "Verify Numerical Reasoning",
            "description": "Measures numerical reasoning",
            "duration": "18 minutes",
            "remote_support": true,
            "adaptive_support": true,
            "test_type": ["Ability & Aptitude"],
            "keywords": "numbers, data"
        })
    }

    fn write_catalog(records: &Value) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.json");
        std::fs::write(&path, records.to_string()).unwrap();
        (tmp, path)
    }

    #[test]
    fn validates_complete_record() {
        let entry = validate_record(0, &valid_record()).unwrap();
        assert_eq!(entry.item.name, "Verify Numerical Reasoning");
        assert_eq!(entry.item.test_type, vec!["Ability & Aptitude"]);
        assert_eq!(entry.keywords.as_deref(), Some("numbers, data"));
        assert!(entry.document_text().contains("Keywords: numbers, data"));
    }

    #[test]
    fn name_is_optional() {
        let mut record = valid_record();
        record.as_object_mut().unwrap().remove("name");
        let entry = validate_record(3, &record).unwrap();
        assert_eq!(entry.item.name, "");
    }

    #[test]
    fn missing_required_field_is_rejected() {
        for field in [
            "url",
            "description",
            "duration",
            "remote_support",
            "adaptive_support",
            "test_type",
        ] {
            let mut record = valid_record();
            record.as_object_mut().unwrap().remove(field);
            let err = validate_record(7, &record).unwrap_err();
            match err {
                Error::RecordValidation { index, reason } => {
                    assert_eq!(index, 7);
                    assert!(reason.contains(field), "{reason}");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn wrong_types_are_rejected() {
        let mut record = valid_record();
        record["remote_support"] = json!("yes");
        assert!(validate_record(0, &record).is_err());

        let mut record = valid_record();
        record["test_type"] = json!("Cognitive");
        assert!(validate_record(0, &record).is_err());

        assert!(validate_record(0, &json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn load_skips_invalid_records() {
        let mut broken = valid_record();
        broken.as_object_mut().unwrap().remove("duration");
        let mut second = valid_record();
        second["url"] = json!("https://example.com/other");

        let (_tmp, path) = write_catalog(&json!([valid_record(), broken, second]));
        let entries = load_catalog(&path).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].item.url, "https://example.com/other");
    }

    #[test]
    fn load_keeps_first_record_per_url() {
        let mut first = valid_record();
        first["url"] = json!("dup");
        first["name"] = json!("First");
        let mut second = first.clone();
        second["name"] = json!("Second");

        let (_tmp, path) = write_catalog(&json!([first, valid_record(), second]));
        let entries = load_catalog(&path).unwrap();

        let dups: Vec<_> = entries.iter().filter(|e| e.item.url == "dup").collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].item.name, "First");
    }

    #[test]
    fn missing_file_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_catalog(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::DataLoad { .. }));
    }

    #[test]
    fn empty_catalog_is_fatal() {
        let (_tmp, path) = write_catalog(&json!([]));
        assert!(matches!(
            load_catalog(&path).unwrap_err(),
            Error::DataLoad { .. }
        ));
    }

    #[test]
    fn catalog_without_valid_records_is_fatal() {
        let (_tmp, path) = write_catalog(&json!([{"url": "x"}]));
        assert!(matches!(
            load_catalog(&path).unwrap_err(),
            Error::DataLoad { .. }
        ));
    }
}
