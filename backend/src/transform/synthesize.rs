//! Field metadata and dataset quality metrics.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::models::{DataQuality, Dataset, FieldInfo, FieldType, Row};

/// Non-null values inspected per column to infer its type.
pub const SAMPLE_POOL: usize = 5;

/// Sample values published per field.
pub const PUBLISHED_SAMPLES: usize = 3;

/// Output of schema synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub field_infos: IndexMap<String, FieldInfo>,
    pub quality: DataQuality,
}

pub fn synthesize(dataset: &Dataset) -> Synthesis {
    let field_infos = dataset
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), field_info(dataset, i)))
        .collect();

    let quality = DataQuality {
        empty_rows_removed: dataset.empty_rows_removed,
        empty_columns_removed: dataset.empty_columns_removed,
        duplicate_rows: duplicate_rows(&dataset.rows),
        completeness_score: completeness_score(dataset),
    };

    Synthesis { field_infos, quality }
}

/// Metadata of column `index`. Nulls are excluded from `unique_count`.
pub fn field_info(dataset: &Dataset, index: usize) -> FieldInfo {
    let pool: Vec<_> = dataset
        .column(index)
        .filter(|v| !v.is_null())
        .take(SAMPLE_POOL)
        .cloned()
        .collect();

    let tags: HashSet<FieldType> = pool.iter().filter_map(|v| v.field_type()).collect();
    let inferred_type = match tags.len() {
        0 => FieldType::Text,
        1 => tags.into_iter().next().unwrap_or(FieldType::Text),
        _ => FieldType::Mixed,
    };

    let null_count = dataset.column(index).filter(|v| v.is_null()).count();
    let unique_count = dataset
        .column(index)
        .filter(|v| !v.is_null())
        .collect::<HashSet<_>>()
        .len();

    FieldInfo {
        name: dataset.columns[index].clone(),
        inferred_type,
        sample_values: pool.into_iter().take(PUBLISHED_SAMPLES).collect(),
        null_count,
        unique_count,
    }
}

/// Rows equal to an earlier row.
pub fn duplicate_rows(rows: &[Row]) -> usize {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.iter().filter(|row| !seen.insert(*row)).count()
}

/// Percentage of non-null cells, rounded to two decimals. 100 for an empty
/// dataset.
pub fn completeness_score(dataset: &Dataset) -> f64 {
    let cells = dataset.row_count() * dataset.column_count();
    if cells == 0 {
        return 100.0;
    }
    let nulls = dataset.rows.iter().flatten().filter(|v| v.is_null()).count();
    let score = (1.0 - nulls as f64 / cells as f64) * 100.0;
    (score * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TypedValue::{self, Bool, Float, Integer, Null, Text};

    fn dataset(columns: &[&str], rows: Vec<Vec<TypedValue>>) -> Dataset {
        Dataset {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows,
            ..Default::default()
        }
    }

    #[test]
    fn test_field_info() {
        let ds = dataset(
            &["age", "mixed"],
            vec![
                vec![Integer(30), Text("a".into())],
                vec![Null, Float(1.5)],
                vec![Integer(41), Bool(true)],
                vec![Integer(30), Null],
                vec![Integer(52), Text("a".into())],
            ],
        );
        let synthesis = synthesize(&ds);

        let age = &synthesis.field_infos["age"];
        assert_eq!(age.inferred_type, FieldType::Integer);
        assert_eq!(age.sample_values, vec![Integer(30), Integer(41), Integer(30)]);
        assert_eq!(age.null_count, 1);
        assert_eq!(age.unique_count, 3);

        let mixed = &synthesis.field_infos["mixed"];
        assert_eq!(mixed.inferred_type, FieldType::Mixed);
        assert_eq!(mixed.unique_count, 3);
        assert_eq!(mixed.null_count, 1);
    }

    #[test]
    fn test_type_from_first_five_only() {
        let mut rows: Vec<Vec<TypedValue>> = (0..5).map(|i| vec![Integer(i)]).collect();
        rows.push(vec![Text("late".into())]);
        let info = field_info(&dataset(&["n"], rows), 0);
        assert_eq!(info.inferred_type, FieldType::Integer);
    }

    #[test]
    fn test_duplicate_rows() {
        let rows = vec![
            vec![Integer(1), Text("a".into())],
            vec![Integer(1), Text("a".into())],
            vec![Integer(2), Text("a".into())],
            vec![Integer(1), Text("a".into())],
        ];
        assert_eq!(duplicate_rows(&rows), 2);
    }

    #[test]
    fn test_signed_zero_counts_as_one_value() {
        let table = crate::parser::RawTable {
            headers: vec!["x".into()],
            rows: vec![vec!["0.0".into()], vec!["-0.0".into()]],
        };
        let ds = crate::transform::normalize::normalize(&table);
        assert_eq!(ds.rows[0], ds.rows[1]);

        let synthesis = synthesize(&ds);
        assert_eq!(synthesis.field_infos["x"].unique_count, 1);
        assert_eq!(synthesis.quality.duplicate_rows, 1);
    }

    #[test]
    fn test_completeness_score() {
        let full = dataset(&["a"], vec![vec![Integer(1)], vec![Integer(2)]]);
        assert_eq!(completeness_score(&full), 100.0);

        let third = dataset(&["a", "b", "c"], vec![vec![Integer(1), Null, Null]]);
        assert_eq!(completeness_score(&third), 33.33);

        assert_eq!(completeness_score(&Dataset::default()), 100.0);
    }

    #[test]
    fn test_completeness_in_range() {
        let all_null = dataset(&["a"], vec![vec![Null]]);
        let score = completeness_score(&all_null);
        assert!((0.0..=100.0).contains(&score));
        assert_eq!(score, 0.0);
    }
}
