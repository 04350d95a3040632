//! # Data Catalog
//!
//! Read-only lookup of declarative game data: replacer templates, biome
//! declarations, tileset parameters, creature templates, and loot tables.
//!
//! Generation only ever talks to the [`DataCatalog`] trait. [`JsonCatalog`] is
//! the in-crate implementation over a `serde_json` document, shipped with an
//! embedded default data set.

pub mod defs;

pub use defs::*;

use crate::{WeaveError, WeaveResult};
use serde_json::Value;
use std::path::Path;

/// Embedded default data set.
const BUILTIN_CATALOG: &str = include_str!("../../data/catalog.json");

/// Read-only category/entry/field lookup.
///
/// Every query addresses one field of one declaration, e.g.
/// `("biomes", "meadow", "tileset")`.
pub trait DataCatalog {
    /// Scalar field as text. Numbers and booleans are rendered as strings.
    fn get_value(&self, category: &str, entry: &str, field: &str) -> Option<String>;

    /// Numeric field. Numeric strings are parsed.
    fn get_number_value(&self, category: &str, entry: &str, field: &str) -> Option<f64>;

    /// Array field with each element rendered as text; `None` if the field is
    /// not declared at all.
    fn get_array_value(&self, category: &str, entry: &str, field: &str) -> Option<Vec<String>>;

    /// Names of every entry in a category, in a stable order.
    fn get_entries(&self, category: &str) -> Vec<String>;

    /// Whether the entry is declared.
    fn has_entry(&self, category: &str, entry: &str) -> bool {
        self.get_entries(category).iter().any(|name| name == entry)
    }
}

/// [`DataCatalog`] backed by a JSON document of the shape
/// `{ category: { entry: { field: value } } }`.
///
/// # Examples
///
/// ```
/// use worldweave::{DataCatalog, JsonCatalog};
///
/// let catalog = JsonCatalog::from_str(r#"{"biomes": {"meadow": {"priority": 1}}}"#).unwrap();
/// assert_eq!(catalog.get_number_value("biomes", "meadow", "priority"), Some(1.0));
/// assert_eq!(catalog.get_entries("biomes"), vec!["meadow".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    root: Value,
}

impl JsonCatalog {
    /// Wraps an already parsed document. The root must be an object.
    pub fn new(root: Value) -> WeaveResult<Self> {
        if !root.is_object() {
            return Err(WeaveError::Catalog("catalog root must be an object".to_string()));
        }
        Ok(Self { root })
    }

    /// Parses a catalog from JSON text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> WeaveResult<Self> {
        Self::new(serde_json::from_str(text)?)
    }

    /// Reads and parses a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> WeaveResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded catalog from {}", path.as_ref().display());
        Self::from_str(&text)
    }

    /// The embedded default data set.
    pub fn builtin() -> WeaveResult<Self> {
        Self::from_str(BUILTIN_CATALOG)
    }

    fn field(&self, category: &str, entry: &str, field: &str) -> Option<&Value> {
        self.root.get(category)?.get(entry)?.get(field)
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl DataCatalog for JsonCatalog {
    fn get_value(&self, category: &str, entry: &str, field: &str) -> Option<String> {
        self.field(category, entry, field).and_then(render)
    }

    fn get_number_value(&self, category: &str, entry: &str, field: &str) -> Option<f64> {
        match self.field(category, entry, field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn get_array_value(&self, category: &str, entry: &str, field: &str) -> Option<Vec<String>> {
        let items = self.field(category, entry, field)?.as_array()?;
        Some(items.iter().filter_map(render).collect())
    }

    fn get_entries(&self, category: &str) -> Vec<String> {
        self.root
            .get(category)
            .and_then(Value::as_object)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "tilesets": {
            "stone": { "inherits": "default", "elevationBase": "12", "inner.N": [".#./.*./...", 7] }
        }
    }"#;

    #[test]
    fn test_lookups() {
        let catalog = JsonCatalog::from_str(SAMPLE).unwrap();
        assert_eq!(
            catalog.get_value("tilesets", "stone", "inherits"),
            Some("default".to_string())
        );
        assert_eq!(catalog.get_number_value("tilesets", "stone", "elevationBase"), Some(12.0));
        assert_eq!(
            catalog.get_array_value("tilesets", "stone", "inner.N"),
            Some(vec![".#./.*./...".to_string(), "7".to_string()])
        );
        assert_eq!(catalog.get_array_value("tilesets", "stone", "inner.I"), None);
        assert_eq!(catalog.get_value("tilesets", "grass", "inherits"), None);
        assert!(catalog.has_entry("tilesets", "stone"));
        assert!(catalog.get_entries("biomes").is_empty());
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(matches!(JsonCatalog::from_str("[1, 2]"), Err(WeaveError::Catalog(_))));
        assert!(matches!(JsonCatalog::from_str("{"), Err(WeaveError::Serde(_))));
    }

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = JsonCatalog::builtin().unwrap();
        assert!(catalog.has_entry("tilesets", "default"));
        assert!(!catalog.get_entries("biomes").is_empty());
        assert!(!catalog.get_entries("creatures").is_empty());
    }
}
