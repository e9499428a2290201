//! Artifact assembly and JSON persistence.
//!
//! The persisted form is UTF-8 JSON with 2-space indentation and the
//! top-level keys `api_info`, `metadata`, `endpoints` and `data`. Loading
//! validates the document against the embedded schema before deserializing.

use chrono::Local;
use serde_json::Value;
use std::path::Path;

use crate::config::IngestOptions;
use crate::error::{ArtifactError, ArtifactResult};
use crate::models::{ApiInfo, Artifact, ArtifactMetadata, Dataset, Endpoints, Record};
use crate::transform::synthesize::Synthesis;
use crate::validation::validate_artifact;

pub const API_VERSION: &str = "1.0";

/// Local ISO-8601 timestamp with microseconds.
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Provenance for a file ingested through the full pipeline.
pub fn api_info_for(source: &Path) -> ApiInfo {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(stem);

    ApiInfo {
        version: API_VERSION.to_string(),
        title: format!("{} API", stem),
        description: format!("Generated JSON API from {} file", extension),
        generated_at: timestamp(),
        source_file: file_name.to_string(),
    }
}

/// Assemble the artifact. Metadata describes the whole dataset even when the
/// records are capped by `options`.
pub fn build_artifact(
    dataset: &Dataset,
    synthesis: Synthesis,
    source: &Path,
    options: &IngestOptions,
) -> Artifact {
    let mut records = dataset.records();
    records.truncate(options.record_cap(records.len()));

    Artifact {
        api_info: api_info_for(source),
        metadata: ArtifactMetadata {
            total_records: dataset.row_count(),
            total_fields: dataset.column_count(),
            field_names: dataset.columns.clone(),
            field_infos: synthesis.field_infos,
            data_quality: Some(synthesis.quality),
        },
        endpoints: Some(Endpoints::default()),
        data: records,
    }
}

/// Artifact for the untyped upload path: no field metadata, no endpoints.
pub fn build_fallback_artifact(
    file_name: &str,
    headers: Vec<String>,
    records: Vec<Record>,
) -> Artifact {
    Artifact {
        api_info: ApiInfo {
            version: API_VERSION.to_string(),
            title: format!("{} API", file_name),
            description: format!("Uploaded CSV file with {} records", records.len()),
            generated_at: timestamp(),
            source_file: file_name.to_string(),
        },
        metadata: ArtifactMetadata {
            total_records: records.len(),
            total_fields: headers.len(),
            field_names: headers,
            field_infos: Default::default(),
            data_quality: None,
        },
        endpoints: None,
        data: records,
    }
}

impl Artifact {
    pub fn to_json_pretty(&self) -> ArtifactResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and schema-check an artifact document.
    pub fn from_json(content: &str) -> ArtifactResult<Self> {
        let value: Value = serde_json::from_str(content)?;
        validate_artifact(&value).map_err(ArtifactError::Schema)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn save(&self, path: &Path) -> ArtifactResult<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> ArtifactResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
