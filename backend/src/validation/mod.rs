//! JSON Schema validation of artifact documents.
//!
//! The artifact schema (draft 7) is embedded at compile time from
//! `schemas/artifact.schema.json` and checked before a saved artifact is
//! deserialized, so a hand-edited or foreign file is rejected with readable
//! messages instead of a serde error deep in the structure.

use once_cell::sync::Lazy;
use serde_json::Value;

static ARTIFACT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/artifact.schema.json"))
        .expect("Invalid embedded schema")
});

/// Validate `data` against `schema`.
///
/// Returns every violation message on failure.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a document against the artifact schema.
pub fn validate_artifact(data: &Value) -> Result<(), Vec<String>> {
    validate(&ARTIFACT_SCHEMA, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "api_info": {
                "version": "1.0",
                "title": "people API",
                "description": "Generated JSON API from .csv file",
                "generated_at": "2024-01-01T00:00:00.000000",
                "source_file": "people.csv"
            },
            "metadata": {
                "total_records": 1,
                "total_fields": 2,
                "fields": ["name", "age"],
                "fields_info": {
                    "age": {
                        "name": "age",
                        "type": "integer",
                        "sample_values": [30],
                        "null_count": 0,
                        "unique_count": 1
                    }
                },
                "data_quality": {
                    "empty_rows_removed": 0,
                    "empty_columns_removed": 0,
                    "duplicate_rows": 0,
                    "completeness_score": 100.0
                }
            },
            "data": [{ "name": "Bob", "age": 30 }]
        })
    }

    #[test]
    fn test_valid_artifact() {
        assert!(validate_artifact(&minimal()).is_ok());
    }

    #[test]
    fn test_nested_record_value_rejected() {
        let mut doc = minimal();
        doc["data"][0]["name"] = json!({ "first": "Bob" });
        assert!(validate_artifact(&doc).is_err());
    }

    #[test]
    fn test_unknown_field_type_rejected() {
        let mut doc = minimal();
        doc["metadata"]["fields_info"]["age"]["type"] = json!("date");
        let errors = validate_artifact(&doc).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_completeness_out_of_range_rejected() {
        let mut doc = minimal();
        doc["metadata"]["data_quality"]["completeness_score"] = json!(101.0);
        assert!(validate_artifact(&doc).is_err());
    }
}
