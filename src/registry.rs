//! The watched keyword list, kept in a small JSON document.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::utils::error::{AppError, Result};

const KEYWORD_FIELD: &str = "keyword";

/// Ordered set of keywords stored as `{"keyword": [...]}`.
///
/// Other top-level fields in the document are left as they are on rewrite.
/// A missing file is an empty registry.
#[derive(Debug, Clone)]
pub struct KeywordRegistry {
    path: PathBuf,
}

impl KeywordRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Map::new()),
            Ok(raw) => match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => Ok(map),
                _ => Err(AppError::Validation(format!(
                    "{} is not a JSON object",
                    self.path.display()
                ))),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn keywords_in(&self, document: &Map<String, Value>) -> Result<Vec<String>> {
        match document.get(KEYWORD_FIELD) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()),
            Some(_) => Err(AppError::Validation(format!(
                "'{}' in {} is not a list",
                KEYWORD_FIELD,
                self.path.display()
            ))),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, document)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| AppError::Io(e.error))?;
        Ok(())
    }

    /// Keywords in insertion order.
    pub fn list(&self) -> Result<Vec<String>> {
        let document = self.read_document()?;
        self.keywords_in(&document)
    }

    pub fn contains(&self, keyword: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|k| k == keyword.trim()))
    }

    /// Appends `keyword`. Returns `false` if it was already registered.
    pub fn add(&self, keyword: &str) -> Result<bool> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::Validation("keyword must not be empty".to_string()));
        }

        let mut document = self.read_document()?;
        let mut keywords = self.keywords_in(&document)?;
        if keywords.iter().any(|k| k == keyword) {
            debug!(keyword, "keyword already registered");
            return Ok(false);
        }

        keywords.push(keyword.to_string());
        document.insert(KEYWORD_FIELD.to_string(), Value::from(keywords));
        self.write_document(&document)?;
        info!(keyword, "keyword added");
        Ok(true)
    }

    /// Removes `keyword`. Returns `false` if it was not registered.
    pub fn remove(&self, keyword: &str) -> Result<bool> {
        let keyword = keyword.trim();
        let mut document = self.read_document()?;
        let mut keywords = self.keywords_in(&document)?;

        let before = keywords.len();
        keywords.retain(|k| k != keyword);
        if keywords.len() == before {
            debug!(keyword, "keyword not registered");
            return Ok(false);
        }

        document.insert(KEYWORD_FIELD.to_string(), Value::from(keywords));
        self.write_document(&document)?;
        info!(keyword, "keyword removed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> KeywordRegistry {
        KeywordRegistry::new(dir.path().join("data").join("data.json"))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(registry(&dir).list().unwrap().is_empty());
    }

    #[test]
    fn test_add_preserves_insertion_order_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);

        assert!(registry.add("키보드").unwrap());
        assert!(registry.add("  ssd ").unwrap());
        assert!(registry.add("모니터").unwrap());
        assert!(!registry.add("ssd").unwrap());

        assert_eq!(registry.list().unwrap(), vec!["키보드", "ssd", "모니터"]);
        assert!(registry.contains("ssd").unwrap());
    }

    #[test]
    fn test_empty_keyword_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = registry(&dir).add("   ").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        registry.add("ssd").unwrap();
        registry.add("키보드").unwrap();

        assert!(registry.remove("ssd").unwrap());
        assert!(!registry.remove("ssd").unwrap());
        assert_eq!(registry.list().unwrap(), vec!["키보드"]);
    }

    #[test]
    fn test_other_fields_survive_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(
            &path,
            r#"{"keyword": ["ssd"], "smtp_settings": {"server": "smtp.kakao.com", "port": "465"}}"#,
        )
        .unwrap();

        let registry = KeywordRegistry::new(&path);
        registry.add("마우스").unwrap();

        let document: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["keyword"], serde_json::json!(["ssd", "마우스"]));
        assert_eq!(document["smtp_settings"]["server"], "smtp.kakao.com");
        // Non-ASCII is written as-is, not escaped.
        assert!(fs::read_to_string(&path).unwrap().contains("마우스"));
    }

    #[test]
    fn test_keyword_field_of_wrong_type_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"{"keyword": "ssd"}"#).unwrap();

        assert!(matches!(
            KeywordRegistry::new(&path).list(),
            Err(AppError::Validation(_))
        ));
    }
}
