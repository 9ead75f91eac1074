//! Database documents
//!
//! A whole-database export is one JSON object of named sections, each a map
//! from record id to record. Exports of a single sub-path (`/products`) are
//! just the section map. [`DatabaseDocument`] loads either shape and writes
//! back the same one, keeping every section and key order it did not touch.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ModelError, Result};
use crate::record::ProductView;

/// Well-known top-level sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Products,
    SpareParts,
    Users,
    UserProfiles,
    Quotes,
    Clients,
    AppSettings,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Products,
        Section::SpareParts,
        Section::Users,
        Section::UserProfiles,
        Section::Quotes,
        Section::Clients,
        Section::AppSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::SpareParts => "spareparts",
            Self::Users => "users",
            Self::UserProfiles => "user_profiles",
            Self::Quotes => "quotes",
            Self::Clients => "clients",
            Self::AppSettings => "app_settings",
        }
    }

    /// Sections stored as `owner uid -> item id -> item`
    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Quotes | Self::Clients)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().trim_matches('/');
        Self::ALL
            .iter()
            .copied()
            .find(|section| section.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ModelError::validation(format!("unknown section '{}'", s)))
    }
}

/// What the loaded JSON represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentScope {
    /// The database root with named sections
    Root,
    /// A single section exported from its sub-path
    Subtree(Section),
}

impl DocumentScope {
    /// Import path in the web console for a file of this scope
    pub fn import_path(&self) -> String {
        match self {
            Self::Root => "/".to_string(),
            Self::Subtree(section) => format!("/{}", section),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseDocument {
    root: Map<String, Value>,
    scope: DocumentScope,
}

impl DatabaseDocument {
    /// Detect the scope: a root export has at least one known section
    /// holding an object; anything else is treated as a products subtree.
    pub fn detect_scope(value: &Value) -> DocumentScope {
        let is_root = value.as_object().is_some_and(|map| {
            Section::ALL
                .iter()
                .any(|s| map.get(s.as_str()).is_some_and(Value::is_object))
        });
        if is_root {
            DocumentScope::Root
        } else {
            DocumentScope::Subtree(Section::Products)
        }
    }

    pub fn from_value(value: Value, scope: Option<DocumentScope>) -> Result<Self> {
        let scope = scope.unwrap_or_else(|| Self::detect_scope(&value));
        let object = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return Err(ModelError::InvalidDocument(json_kind(&other).into())),
        };
        let root = match scope {
            DocumentScope::Root => object,
            DocumentScope::Subtree(section) => {
                let mut root = Map::new();
                root.insert(section.as_str().to_string(), Value::Object(object));
                root
            },
        };
        Ok(Self { root, scope })
    }

    pub fn from_json_str(text: &str, scope: Option<DocumentScope>) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value, scope)
    }

    pub fn empty() -> Self {
        Self {
            root: Map::new(),
            scope: DocumentScope::Root,
        }
    }

    pub fn scope(&self) -> DocumentScope {
        self.scope
    }

    /// Value in the shape it was loaded in
    pub fn to_value(&self) -> Value {
        match self.scope {
            DocumentScope::Root => Value::Object(self.root.clone()),
            DocumentScope::Subtree(section) => self
                .root
                .get(section.as_str())
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
        }
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_value())?)
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    /// Section map by raw name; non-object sections read as absent
    pub fn section_by_name(&self, name: &str) -> Option<&Map<String, Value>> {
        self.root.get(name).and_then(Value::as_object)
    }

    pub fn section(&self, section: Section) -> Option<&Map<String, Value>> {
        self.section_by_name(section.as_str())
    }

    /// Mutable section, created empty when absent
    pub fn section_mut(&mut self, section: Section) -> Result<&mut Map<String, Value>> {
        let entry = self
            .root
            .entry(section.as_str().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
        entry
            .as_object_mut()
            .ok_or_else(|| ModelError::InvalidSection(section.as_str().into()))
    }

    pub fn replace_section(&mut self, section: Section, records: Map<String, Value>) {
        self.root
            .insert(section.as_str().to_string(), Value::Object(records));
    }

    /// Record ids and objects of a section in document order
    pub fn records(&self, section: Section) -> impl Iterator<Item = (&str, &Map<String, Value>)> {
        self.section(section)
            .into_iter()
            .flat_map(|map| map.iter())
            .filter_map(|(key, value)| value.as_object().map(|obj| (key.as_str(), obj)))
    }

    pub fn record_mut(&mut self, section: Section, key: &str) -> Option<&mut Map<String, Value>> {
        self.root
            .get_mut(section.as_str())
            .and_then(Value::as_object_mut)
            .and_then(|map| map.get_mut(key))
            .and_then(Value::as_object_mut)
    }

    /// Per-section counts, stock totals and warehouse coverage
    pub fn summary(&self) -> Vec<SectionSummary> {
        self.root
            .iter()
            .map(|(name, value)| SectionSummary::of(name, value))
            .collect()
    }
}

/// Record key usable as a database path segment
///
/// Characters the realtime database rejects in keys become `_`.
pub fn safe_key(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '.' | '#' | '$' | '[' | ']' | '/' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionSummary {
    pub name: String,
    /// Direct entries (owners for nested sections)
    pub entries: usize,
    /// Items below the owners of nested sections
    pub nested_items: Option<usize>,
    pub total_stock: u64,
    pub with_stock: usize,
    pub with_price: usize,
    /// Records with stock but no known warehouse
    pub missing_warehouse: usize,
}

impl SectionSummary {
    fn of(name: &str, value: &Value) -> Self {
        let mut summary = SectionSummary {
            name: name.to_string(),
            ..Default::default()
        };
        let Some(map) = value.as_object() else {
            return summary;
        };
        summary.entries = map.len();

        let nested = name
            .parse::<Section>()
            .map(|s| s.is_nested())
            .unwrap_or(false);
        if nested {
            summary.nested_items = Some(
                map.values()
                    .filter_map(Value::as_object)
                    .map(|items| items.len())
                    .sum(),
            );
            return summary;
        }

        let stocked = matches!(
            name.parse::<Section>(),
            Ok(Section::Products | Section::SpareParts)
        );
        if stocked {
            for record in map.values() {
                let view = ProductView::from_record(record);
                summary.total_stock += view.stock;
                if view.stock > 0 {
                    summary.with_stock += 1;
                }
                if view.price.is_some() {
                    summary.with_price += 1;
                }
                if view.violates_warehouse_invariant() {
                    summary.missing_warehouse += 1;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // json! macro and test unwraps
mod tests {
    use super::*;
    use serde_json::json;

    const EXPORT: &str = r#"{
        "users": {"u1": {"email": "a@x.mx"}},
        "products": {
            "ABC-100": {"sku": "ABC-100", "stock": 0, "price": 10},
            "product_0002": {"sku": "TSR-23SD-N", "stock": 4, "warehouse": "CA"}
        },
        "quotes": {"u1": {"q1": {"total": 1}, "q2": {"total": 2}}},
        "clients": {"u1": {"c1": {}}, "u2": {"c2": {}, "c3": {}}},
        "app_settings": {"currency": "MXN"}
    }"#;

    #[test]
    fn test_round_trip_preserves_document() {
        let original: Value = serde_json::from_str(EXPORT).unwrap();
        let doc = DatabaseDocument::from_json_str(EXPORT, None).unwrap();
        assert_eq!(doc.scope(), DocumentScope::Root);

        let saved = doc.to_pretty_json().unwrap();
        let reloaded: Value = serde_json::from_str(&saved).unwrap();
        assert_eq!(reloaded, original);

        let keys: Vec<_> = reloaded.as_object().unwrap().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["users", "products", "quotes", "clients", "app_settings"]
        );
    }

    #[test]
    fn test_products_subtree_round_trip() {
        let subtree = json!({"A-1": {"sku": "A-1", "stock": 2}});
        let doc = DatabaseDocument::from_value(subtree.clone(), None).unwrap();
        assert_eq!(doc.scope(), DocumentScope::Subtree(Section::Products));
        assert_eq!(doc.records(Section::Products).count(), 1);
        assert_eq!(doc.to_value(), subtree);
        assert_eq!(doc.scope().import_path(), "/products");
    }

    #[test]
    fn test_forced_spareparts_scope() {
        let subtree = json!({"P-1": {"sku": "P-1"}});
        let doc = DatabaseDocument::from_value(
            subtree,
            Some(DocumentScope::Subtree(Section::SpareParts)),
        )
        .unwrap();
        assert!(doc.section(Section::Products).is_none());
        assert_eq!(doc.section(Section::SpareParts).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_non_object_root() {
        let result = DatabaseDocument::from_value(json!([1, 2]), Some(DocumentScope::Root));
        assert!(matches!(result, Err(ModelError::InvalidDocument(_))));
    }

    #[test]
    fn test_section_mut_creates_section() {
        let mut doc = DatabaseDocument::from_json_str(EXPORT, None).unwrap();
        doc.section_mut(Section::SpareParts)
            .unwrap()
            .insert("X".into(), json!({"sku": "X"}));
        let names: Vec<_> = doc.section_names().collect();
        assert_eq!(names.last(), Some(&"spareparts"));

        let settings = json!({"app_settings": "frozen", "products": {}});
        let mut doc = DatabaseDocument::from_value(settings, None).unwrap();
        assert!(doc.section_mut(Section::AppSettings).is_err());
    }

    #[test]
    fn test_summary_counts_nested_sections() {
        let doc = DatabaseDocument::from_json_str(EXPORT, None).unwrap();
        let summary = doc.summary();
        let by_name = |name: &str| summary.iter().find(|s| s.name == name).unwrap().clone();

        assert_eq!(by_name("quotes").entries, 1);
        assert_eq!(by_name("quotes").nested_items, Some(2));
        assert_eq!(by_name("clients").nested_items, Some(3));

        let products = by_name("products");
        assert_eq!(products.entries, 2);
        assert_eq!(products.total_stock, 4);
        assert_eq!(products.with_stock, 1);
        assert_eq!(products.with_price, 1);
        assert_eq!(products.missing_warehouse, 0);
    }

    #[test]
    fn test_safe_key() {
        assert_eq!(safe_key(" MBF8505/A "), "MBF8505_A");
        assert_eq!(safe_key("T-49.HC#1"), "T-49_HC_1");
        assert_eq!(safe_key("ABC-100"), "ABC-100");
    }

    #[test]
    fn test_section_parse() {
        assert_eq!("/products".parse::<Section>().unwrap(), Section::Products);
        assert_eq!("SpareParts".parse::<Section>().unwrap(), Section::SpareParts);
        assert!("orders".parse::<Section>().is_err());
    }
}
