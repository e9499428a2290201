//! Domain models shared by the pipeline and the query layer.
//!
//! - [`TypedValue`] - A coerced cell value
//! - [`Dataset`] - Normalized column names plus typed rows
//! - [`FieldInfo`] - Per-field metadata
//! - [`ArtifactMetadata`] - Dataset-level metadata and quality metrics
//! - [`Artifact`] - The complete output of one ingest

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

// =============================================================================
// Typed values
// =============================================================================

/// A single coerced cell.
///
/// `Float` values are always finite; the coercion rules never produce NaN or
/// infinities, which is what makes the manual `Eq`/`Hash` below sound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Eq for TypedValue {}

impl Hash for TypedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TypedValue::Null => {}
            TypedValue::Bool(b) => b.hash(state),
            TypedValue::Integer(i) => i.hash(state),
            // 0.0 == -0.0, so both must hash alike.
            TypedValue::Float(f) if *f == 0.0 => 0.0f64.to_bits().hash(state),
            TypedValue::Float(f) => f.to_bits().hash(state),
            TypedValue::Text(s) => s.hash(state),
        }
    }
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// Concrete type tag, `None` for nulls.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            TypedValue::Null => None,
            TypedValue::Bool(_) => Some(FieldType::Bool),
            TypedValue::Integer(_) => Some(FieldType::Integer),
            TypedValue::Float(_) => Some(FieldType::Float),
            TypedValue::Text(_) => Some(FieldType::Text),
        }
    }
}

/// Stringified form used by search, filter and the CSV view.
impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => Ok(()),
            TypedValue::Bool(b) => write!(f, "{}", b),
            TypedValue::Integer(i) => write!(f, "{}", i),
            TypedValue::Float(x) if x.fract() == 0.0 && x.abs() < 1e16 => write!(f, "{:.1}", x),
            TypedValue::Float(x) => write!(f, "{}", x),
            TypedValue::Text(s) => f.write_str(s),
        }
    }
}

/// Inferred type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Integer,
    Float,
    Text,
    Mixed,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Mixed => "mixed",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// One typed row, aligned with [`Dataset::columns`].
pub type Row = Vec<TypedValue>;

/// One output record: field name to value, in column order.
pub type Record = IndexMap<String, TypedValue>;

/// Normalized table. Built once per ingest and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub empty_rows_removed: usize,
    pub empty_columns_removed: usize,
}

impl Dataset {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Iterate the values of one column in row order.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &TypedValue> + '_ {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Records in row order.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Metadata of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub inferred_type: FieldType,
    pub sample_values: Vec<TypedValue>,
    pub null_count: usize,
    pub unique_count: usize,
}

impl FieldInfo {
    /// Human-readable one-liner, e.g. `integer field with 12 unique values`.
    pub fn description(&self) -> String {
        format!(
            "{} field with {} unique values",
            self.inferred_type, self.unique_count
        )
    }
}

/// Dataset quality metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub empty_rows_removed: usize,
    pub empty_columns_removed: usize,
    pub duplicate_rows: usize,
    /// Percentage of non-null cells, rounded to two decimals.
    pub completeness_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub total_records: usize,
    pub total_fields: usize,
    #[serde(rename = "fields")]
    pub field_names: Vec<String>,
    #[serde(rename = "fields_info")]
    pub field_infos: IndexMap<String, FieldInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<DataQuality>,
}

// =============================================================================
// Artifact
// =============================================================================

/// Provenance block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub version: String,
    pub title: String,
    pub description: String,
    pub generated_at: String,
    pub source_file: String,
}

/// Static catalog of the query routes, embedded as documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    pub get_all: String,
    pub get_by_id: String,
    pub search: String,
    pub filter: String,
    pub paginate: String,
    pub fields: String,
    pub stats: String,
    pub csv_format: String,
    pub upload: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            get_all: "/api/data".into(),
            get_by_id: "/api/data/{id}".into(),
            search: "/api/data/search?q={query}".into(),
            filter: "/api/data/filter?field={field}&value={value}".into(),
            paginate: "/api/data?page={page}&limit={limit}".into(),
            fields: "/api/fields".into(),
            stats: "/api/stats".into(),
            csv_format: "/api/csv-format".into(),
            upload: "POST /api/upload".into(),
        }
    }
}

/// Complete output of one ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub api_info: ApiInfo,
    pub metadata: ArtifactMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Endpoints>,
    pub data: Vec<Record>,
}
