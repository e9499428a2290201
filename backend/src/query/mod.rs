//! Read operations over the current artifact, plus the untyped upload path.
//!
//! Every operation takes a snapshot of the store first, so a concurrent
//! replacement never changes the data under a running query.

use indexmap::IndexMap;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::artifact::{build_fallback_artifact, timestamp};
use crate::error::{QueryError, QueryResult};
use crate::models::{Artifact, ArtifactMetadata, DataQuality, FieldInfo, Record, TypedValue};
use crate::parser::split_comma_lines;
use crate::store::ArtifactStore;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 100;

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub status: &'static str,
    pub data_loaded: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub data: Vec<Record>,
    pub pagination: Pagination,
    pub metadata: ArtifactMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordAt {
    pub data: Record,
    pub id: usize,
}

/// A matching record annotated with its position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    #[serde(flatten)]
    pub record: Record,
    #[serde(rename = "_id")]
    pub id: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    /// The query, lowercased.
    pub query: String,
    pub results: Vec<Hit>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterResults {
    pub field: String,
    pub value: String,
    pub results: Vec<Hit>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSummary {
    #[serde(flatten)]
    pub info: FieldInfo,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldsMetadata {
    pub total_records: usize,
    pub data_quality: Option<DataQuality>,
    pub source_file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Fields {
    pub fields: IndexMap<String, FieldSummary>,
    pub field_names: Vec<String>,
    pub total_fields: usize,
    pub metadata: FieldsMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_records: usize,
    pub total_fields: usize,
    pub data_quality: Option<DataQuality>,
    pub generated_at: String,
    pub source_file: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub statistics: Statistics,
    pub fields_summary: IndexMap<String, FieldInfo>,
}

/// Records as string rows, header row first.
#[derive(Debug, Clone, Serialize)]
pub struct CsvView {
    pub csv_data: Vec<Vec<String>>,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub col_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub message: String,
    pub records: usize,
    pub fields: usize,
}

// =============================================================================
// Engine
// =============================================================================

/// Query operations bound to an [`ArtifactStore`].
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: Arc<ArtifactStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    fn artifact(&self) -> QueryResult<Arc<Artifact>> {
        self.store.current().ok_or(QueryError::NotReady)
    }

    pub fn status(&self) -> Status {
        Status {
            status: "healthy",
            data_loaded: self.store.is_loaded(),
            timestamp: timestamp(),
        }
    }

    /// One page of records. `page` and `limit` start at 1.
    pub fn paginate(&self, page: usize, limit: usize) -> QueryResult<Page> {
        let artifact = self.artifact()?;
        if page == 0 || limit == 0 {
            return Err(QueryError::BadRequest(
                "page and limit must be positive integers".into(),
            ));
        }

        let total = artifact.data.len();
        let start = (page - 1).saturating_mul(limit);
        let end = start.saturating_add(limit);
        let data = artifact
            .data
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect();

        Ok(Page {
            data,
            pagination: Pagination {
                page,
                limit,
                total,
                pages: total.div_ceil(limit),
                has_next: end < total,
                has_prev: page > 1,
            },
            metadata: artifact.metadata.clone(),
        })
    }

    /// Record at zero-based position `id`.
    pub fn get_by_position(&self, id: &str) -> QueryResult<RecordAt> {
        let artifact = self.artifact()?;
        let not_found = || QueryError::NotFound("Record not found".into());
        let id: usize = id.trim().parse().map_err(|_| not_found())?;
        let record = artifact.data.get(id).ok_or_else(not_found)?;
        Ok(RecordAt {
            data: record.clone(),
            id,
        })
    }

    /// Records with any value containing `query`, ignoring case.
    pub fn search(&self, query: &str) -> QueryResult<SearchResults> {
        let artifact = self.artifact()?;
        let query = query.to_lowercase();
        if query.is_empty() {
            return Err(QueryError::BadRequest(
                "Query parameter 'q' is required".into(),
            ));
        }

        let results: Vec<Hit> = hits(&artifact.data, |record| {
            record
                .values()
                .any(|v| !v.is_null() && v.to_string().to_lowercase().contains(&query))
        });

        Ok(SearchResults {
            query,
            count: results.len(),
            results,
        })
    }

    /// Records whose `field` equals `value`, ignoring case.
    pub fn filter(&self, field: &str, value: &str) -> QueryResult<FilterResults> {
        let artifact = self.artifact()?;
        if field.is_empty() || value.is_empty() {
            return Err(QueryError::BadRequest(
                "Query parameters 'field' and 'value' are required".into(),
            ));
        }
        let known = artifact.metadata.field_names.iter().any(|f| f == field)
            || artifact.data.first().is_some_and(|r| r.contains_key(field));
        if !known {
            return Err(QueryError::BadRequest(format!("Unknown field '{}'", field)));
        }

        let wanted = value.to_lowercase();
        let results: Vec<Hit> = hits(&artifact.data, |record| {
            record
                .get(field)
                .is_some_and(|v| v.to_string().to_lowercase() == wanted)
        });

        Ok(FilterResults {
            field: field.to_string(),
            value: value.to_string(),
            count: results.len(),
            results,
        })
    }

    pub fn field_info(&self) -> QueryResult<Fields> {
        let artifact = self.artifact()?;
        let metadata = &artifact.metadata;

        let fields: IndexMap<String, FieldSummary> = metadata
            .field_infos
            .iter()
            .map(|(name, info)| {
                let summary = FieldSummary {
                    info: info.clone(),
                    description: info.description(),
                };
                (name.clone(), summary)
            })
            .collect();

        Ok(Fields {
            field_names: fields.keys().cloned().collect(),
            total_fields: fields.len(),
            fields,
            metadata: FieldsMetadata {
                total_records: metadata.total_records,
                data_quality: metadata.data_quality.clone(),
                source_file: artifact.api_info.source_file.clone(),
            },
        })
    }

    pub fn stats(&self) -> QueryResult<Stats> {
        let artifact = self.artifact()?;
        let metadata = &artifact.metadata;
        let info = &artifact.api_info;

        Ok(Stats {
            statistics: Statistics {
                total_records: metadata.total_records,
                total_fields: metadata.total_fields,
                data_quality: metadata.data_quality.clone(),
                generated_at: info.generated_at.clone(),
                source_file: info.source_file.clone(),
                api_version: info.version.clone(),
            },
            fields_summary: metadata.field_infos.clone(),
        })
    }

    pub fn csv_format(&self) -> QueryResult<CsvView> {
        let artifact = self.artifact()?;
        let first = artifact
            .data
            .first()
            .ok_or_else(|| QueryError::NotFound("No data available".into()))?;
        let headers: Vec<String> = first.keys().cloned().collect();

        let mut csv_data = Vec::with_capacity(artifact.data.len() + 1);
        csv_data.push(headers.clone());
        csv_data.extend(artifact.data.iter().map(|record| {
            headers
                .iter()
                .map(|h| record.get(h).map(TypedValue::to_string).unwrap_or_default())
                .collect()
        }));

        Ok(CsvView {
            row_count: csv_data.len() - 1,
            col_count: headers.len(),
            csv_data,
            headers,
        })
    }

    /// Replace the current artifact with an untyped one built from a raw
    /// comma-separated upload. Values stay text; no detection runs.
    pub fn upload_fallback(&self, file_name: Option<&str>, bytes: &[u8]) -> QueryResult<UploadSummary> {
        let file_name = file_name.ok_or_else(|| QueryError::BadRequest("No file provided".into()))?;
        if file_name.is_empty() {
            return Err(QueryError::BadRequest("No file selected".into()));
        }
        let is_csv = Path::new(file_name)
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(QueryError::BadRequest(
                "Only CSV files are supported for upload".into(),
            ));
        }

        let content = std::str::from_utf8(bytes)
            .map_err(|e| QueryError::BadRequest(format!("File is not valid UTF-8: {}", e)))?;
        let mut lines = split_comma_lines(content).into_iter();
        let headers = lines.next().unwrap_or_default();
        let records: Vec<Record> = lines
            .map(|row| {
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| {
                        let cell = row.get(i).cloned().unwrap_or_default();
                        (h.clone(), TypedValue::Text(cell))
                    })
                    .collect()
            })
            .collect();
        if records.is_empty() {
            return Err(QueryError::Empty("CSV file appears to be empty".into()));
        }

        let summary = UploadSummary {
            message: "File uploaded and processed successfully".into(),
            records: records.len(),
            fields: headers.len(),
        };
        tracing::info!(
            file = file_name,
            records = summary.records,
            fields = summary.fields,
            "Replaced artifact from upload"
        );
        self.store
            .replace(build_fallback_artifact(file_name, headers, records));
        Ok(summary)
    }

    /// The whole current artifact.
    pub fn export(&self) -> QueryResult<Arc<Artifact>> {
        self.artifact()
    }
}

fn hits(records: &[Record], mut matches: impl FnMut(&Record) -> bool) -> Vec<Hit> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| matches(record))
        .map(|(id, record)| Hit {
            record: record.clone(),
            id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::build_artifact;
    use crate::config::IngestOptions;
    use crate::parser::RawTable;
    use crate::transform::{normalize::normalize, synthesize::synthesize};
    use serde_json::json;

    fn engine_with(headers: &[&str], rows: &[&[&str]]) -> QueryEngine {
        let table = RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        };
        let dataset = normalize(&table);
        let artifact = build_artifact(
            &dataset,
            synthesize(&dataset),
            Path::new("people.csv"),
            &IngestOptions::default(),
        );
        let store = Arc::new(ArtifactStore::new());
        store.replace(artifact);
        QueryEngine::new(store)
    }

    fn numbered(n: usize) -> QueryEngine {
        let rows: Vec<Vec<String>> = (0..n).map(|i| vec![format!("item{}", i)]).collect();
        let refs: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(|s| s.as_str()).collect()).collect();
        let slices: Vec<&[&str]> = refs.iter().map(|r| r.as_slice()).collect();
        engine_with(&["name"], &slices)
    }

    #[test]
    fn test_not_ready() {
        let engine = QueryEngine::new(Arc::new(ArtifactStore::new()));
        assert_eq!(engine.paginate(1, 10).unwrap_err(), QueryError::NotReady);
        assert_eq!(engine.get_by_position("0").unwrap_err(), QueryError::NotReady);
        assert_eq!(engine.search("x").unwrap_err(), QueryError::NotReady);
        assert_eq!(engine.stats().unwrap_err(), QueryError::NotReady);
        assert!(!engine.status().data_loaded);
    }

    #[test]
    fn test_pagination() {
        let engine = numbered(25);

        let last = engine.paginate(3, 10).unwrap();
        assert_eq!(last.pagination.pages, 3);
        assert_eq!(last.pagination.total, 25);
        assert!(!last.pagination.has_next);
        assert!(last.pagination.has_prev);
        assert_eq!(last.data.len(), 5);
        assert_eq!(last.data[0]["name"], TypedValue::Text("item20".into()));

        let first = engine.paginate(1, 10).unwrap();
        assert!(first.pagination.has_next);
        assert!(!first.pagination.has_prev);

        assert!(engine.paginate(4, 10).unwrap().data.is_empty());
        assert!(matches!(engine.paginate(0, 10), Err(QueryError::BadRequest(_))));
        assert!(matches!(engine.paginate(1, 0), Err(QueryError::BadRequest(_))));
    }

    #[test]
    fn test_get_by_position() {
        let engine = numbered(3);
        let found = engine.get_by_position("2").unwrap();
        assert_eq!(found.id, 2);
        assert_eq!(found.data["name"], TypedValue::Text("item2".into()));

        for bad in ["3", "-1", "abc"] {
            assert!(matches!(engine.get_by_position(bad), Err(QueryError::NotFound(_))));
        }
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let engine = engine_with(&["a"], &[&["Foo"], &["bar"]]);
        let found = engine.search("FOO").unwrap();
        assert_eq!(found.query, "foo");
        assert_eq!(found.count, 1);
        assert_eq!(found.results[0].id, 0);

        let json = serde_json::to_value(&found.results[0]).unwrap();
        assert_eq!(json, json!({ "a": "Foo", "_id": 0 }));

        assert!(matches!(engine.search(""), Err(QueryError::BadRequest(_))));
    }

    #[test]
    fn test_search_matches_typed_values() {
        let engine = engine_with(&["n", "ok"], &[&["30", "yes"], &["1.5", "no"]]);
        assert_eq!(engine.search("30").unwrap().count, 1);
        assert_eq!(engine.search("TRUE").unwrap().results[0].id, 0);
        assert_eq!(engine.search("1.5").unwrap().results[0].id, 1);
    }

    #[test]
    fn test_filter() {
        let engine = engine_with(&["city"], &[&["Oslo"], &["Rome"], &["oslo"]]);
        let found = engine.filter("city", "OSLO").unwrap();
        let ids: Vec<usize> = found.results.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![0, 2]);

        assert!(matches!(engine.filter("country", "x"), Err(QueryError::BadRequest(_))));
        assert!(matches!(engine.filter("city", ""), Err(QueryError::BadRequest(_))));
    }

    #[test]
    fn test_typed_round_trip_through_csv_view() {
        let engine = engine_with(&["Name", "Age", "Active"], &[&["Bob", "30", "true"]]);

        let record = engine.get_by_position("0").unwrap().data;
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "name": "Bob", "age": 30, "active": true })
        );

        let view = engine.csv_format().unwrap();
        assert_eq!(view.headers, vec!["name", "age", "active"]);
        assert_eq!(view.csv_data[1], vec!["Bob", "30", "true"]);
        assert_eq!(view.row_count, 1);
        assert_eq!(view.col_count, 3);
    }

    #[test]
    fn test_field_info_and_stats() {
        let engine = engine_with(&["Age", "Name"], &[&["30", "a"], &["41", "b"], &["", "c"]]);
        let fields = engine.field_info().unwrap();
        assert_eq!(fields.field_names, vec!["age", "name"]);
        assert_eq!(fields.fields["age"].description, "integer field with 2 unique values");
        assert_eq!(fields.metadata.source_file, "people.csv");

        let json = serde_json::to_value(&fields.fields["age"]).unwrap();
        assert_eq!(json["type"], "integer");
        assert_eq!(json["null_count"], 1);

        let stats = engine.stats().unwrap();
        assert_eq!(stats.statistics.total_records, 3);
        assert_eq!(stats.statistics.api_version, "1.0");
        assert!(stats.statistics.data_quality.is_some());
    }

    #[test]
    fn test_upload_keeps_values_as_text() {
        let engine = QueryEngine::new(Arc::new(ArtifactStore::new()));
        let summary = engine
            .upload_fallback(Some("codes.csv"), b" Code , Name\n007,Bond\n008\n")
            .unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.fields, 2);

        let record = engine.get_by_position("0").unwrap().data;
        assert_eq!(record["Code"], TypedValue::Text("007".into()));
        let short = engine.get_by_position("1").unwrap().data;
        assert_eq!(short["Name"], TypedValue::Text(String::new()));

        let exported = engine.export().unwrap();
        assert_eq!(exported.api_info.title, "codes.csv API");
        assert!(exported.metadata.field_infos.is_empty());
        assert!(engine.field_info().unwrap().fields.is_empty());
    }

    #[test]
    fn test_upload_rejections() {
        let engine = QueryEngine::new(Arc::new(ArtifactStore::new()));
        let bad = |name: Option<&str>, body: &[u8]| engine.upload_fallback(name, body).unwrap_err();

        assert!(matches!(bad(None, b"a\n1"), QueryError::BadRequest(_)));
        assert!(matches!(bad(Some(""), b"a\n1"), QueryError::BadRequest(_)));
        assert!(matches!(bad(Some("data.xlsx"), b"a\n1"), QueryError::BadRequest(_)));
        assert!(matches!(bad(Some("data.csv"), &[0xff, 0xfe, b'\n', b'1']), QueryError::BadRequest(_)));
        assert!(matches!(bad(Some("data.csv"), b"only,headers\n"), QueryError::Empty(_)));
        assert!(!engine.status().data_loaded);
    }

    #[test]
    fn test_export_returns_current_artifact() {
        let engine = engine_with(&["Name"], &[&["Ann"], &["Bob"]]);
        let artifact = engine.export().unwrap();
        assert_eq!(artifact.api_info.title, "people API");
        assert_eq!(artifact.data.len(), 2);

        let empty = QueryEngine::new(Arc::new(ArtifactStore::new()));
        assert_eq!(empty.export().unwrap_err(), QueryError::NotReady);
    }

    #[test]
    fn test_csv_view_empty_artifact() {
        let engine = QueryEngine::new(Arc::new(ArtifactStore::new()));
        engine
            .store()
            .replace(build_fallback_artifact("x.csv", vec!["a".into()], Vec::new()));
        assert!(matches!(engine.csv_format(), Err(QueryError::NotFound(_))));
    }
}
