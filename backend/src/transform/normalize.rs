//! Header sanitization, empty row/column pruning and per-cell coercion.
//!
//! Coercion is total: every raw cell maps to exactly one [`TypedValue`] and
//! text is the fallback, so normalization never fails.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::models::{Dataset, TypedValue};
use crate::parser::RawTable;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("valid regex"));
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid regex"));

/// Date shapes kept as text once verified, with their chrono format.
static DATE_SHAPES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"), "%Y-%m-%d"),
        (Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("valid regex"), "%m/%d/%Y"),
        (Regex::new(r"^\d{2}-\d{2}-\d{4}$").expect("valid regex"), "%m-%d-%Y"),
    ]
});

/// Markers read as missing values, compared case-sensitively.
pub const NULL_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub const TRUE_TOKENS: &[&str] = &["true", "yes", "1", "on", "y"];
pub const FALSE_TOKENS: &[&str] = &["false", "no", "0", "off", "n"];

// =============================================================================
// Headers
// =============================================================================

/// Make a header identifier-safe and lower-case. Idempotent.
pub fn sanitize_header(raw: &str) -> String {
    let name = NON_WORD.replace_all(raw.trim(), "_");
    let name = UNDERSCORES.replace_all(&name, "_");
    let name = name.trim_matches('_');

    let name = if name.is_empty() {
        "unnamed_column".to_string()
    } else if name.chars().next().is_some_and(|c| c.is_numeric()) {
        format!("col_{}", name)
    } else {
        name.to_string()
    };

    name.to_lowercase()
}

/// Sanitize every header. A name that collides with an earlier one gets the
/// first free `_2`, `_3`, ... suffix.
pub fn sanitize_headers(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|header| {
            let base = sanitize_header(header);
            let mut name = base.clone();
            let mut n = 2;
            while seen.contains(&name) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}

// =============================================================================
// Cells
// =============================================================================

/// Blank, whitespace-only or a recognized null marker.
pub fn is_null_cell(raw: &str) -> bool {
    let s = raw.trim();
    s.is_empty() || NULL_MARKERS.contains(&s)
}

/// Whether `s` has one of the date shapes and is a real calendar date.
pub fn is_calendar_date(s: &str) -> bool {
    DATE_SHAPES
        .iter()
        .any(|(shape, fmt)| shape.is_match(s) && NaiveDate::parse_from_str(s, fmt).is_ok())
}

/// Coerce one raw cell. First match wins:
/// null, bool, integer, float, calendar date (kept as text), text.
pub fn coerce_cell(raw: &str) -> TypedValue {
    let s = raw.trim();
    if is_null_cell(s) {
        return TypedValue::Null;
    }

    let lower = s.to_lowercase();
    if TRUE_TOKENS.contains(&lower.as_str()) {
        return TypedValue::Bool(true);
    }
    if FALSE_TOKENS.contains(&lower.as_str()) {
        return TypedValue::Bool(false);
    }

    if let Some(number) = parse_number(s) {
        return number;
    }

    if is_calendar_date(s) {
        return TypedValue::Text(s.to_string());
    }

    TypedValue::Text(s.to_string())
}

/// Integer when there is no decimal point or exponent marker, float
/// otherwise. Non-finite values are not numbers here.
fn parse_number(s: &str) -> Option<TypedValue> {
    let float_form = s.contains(['.', 'e', 'E']);
    let value: f64 = s.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    if float_form {
        return Some(TypedValue::Float(value));
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(TypedValue::Integer(i));
    }
    let truncated = value.trunc();
    if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        Some(TypedValue::Integer(truncated as i64))
    } else {
        Some(TypedValue::Float(value))
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// Sanitize headers, coerce cells, then drop all-null rows and all-null
/// columns.
pub fn normalize(table: &RawTable) -> Dataset {
    let columns = sanitize_headers(&table.headers);
    let width = columns.len();

    let coerced: Vec<Vec<TypedValue>> = table
        .rows
        .iter()
        .map(|row| {
            (0..width)
                .map(|i| row.get(i).map(|c| coerce_cell(c)).unwrap_or(TypedValue::Null))
                .collect()
        })
        .collect();

    let total_rows = coerced.len();
    let rows: Vec<Vec<TypedValue>> = coerced
        .into_iter()
        .filter(|row| row.iter().any(|v| !v.is_null()))
        .collect();
    let empty_rows_removed = total_rows - rows.len();

    let keep: Vec<bool> = (0..width)
        .map(|i| rows.iter().any(|row| !row[i].is_null()))
        .collect();
    let empty_columns_removed = keep.iter().filter(|k| !**k).count();

    let columns = columns
        .into_iter()
        .zip(&keep)
        .filter_map(|(name, &k)| k.then_some(name))
        .collect();
    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&keep)
                .filter_map(|(value, &k)| k.then_some(value))
                .collect()
        })
        .collect();

    Dataset {
        columns,
        rows,
        empty_rows_removed,
        empty_columns_removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_sanitize_header() {
        assert_eq!(sanitize_header("  First Name "), "first_name");
        assert_eq!(sanitize_header("Price ($)"), "price");
        assert_eq!(sanitize_header("a--b__c"), "a_b_c");
        assert_eq!(sanitize_header("2024 Sales"), "col_2024_sales");
        assert_eq!(sanitize_header("!!!"), "unnamed_column");
        assert_eq!(sanitize_header(""), "unnamed_column");
        assert_eq!(sanitize_header("Café Crème"), "café_crème");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for raw in ["  First Name ", "2024 Sales", "!!!", "a--b", "Ünïcode Ñame", "_x_", "9"] {
            let once = sanitize_header(raw);
            assert_eq!(sanitize_header(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_colliding_headers_get_suffix() {
        let raw = vec!["A b".to_string(), "a-b".to_string(), "a_b".to_string(), "a_b_2".to_string()];
        assert_eq!(sanitize_headers(&raw), vec!["a_b", "a_b_2", "a_b_3", "a_b_2_2"]);
    }

    #[test]
    fn test_coercion_precedence() {
        assert_eq!(coerce_cell(""), TypedValue::Null);
        assert_eq!(coerce_cell("   "), TypedValue::Null);
        assert_eq!(coerce_cell("N/A"), TypedValue::Null);
        assert_eq!(coerce_cell("null"), TypedValue::Null);

        // "1" and "0" take the boolean branch before the integer branch.
        assert_eq!(coerce_cell("1"), TypedValue::Bool(true));
        assert_eq!(coerce_cell("0"), TypedValue::Bool(false));
        assert_eq!(coerce_cell("TRUE"), TypedValue::Bool(true));
        assert_eq!(coerce_cell("Yes"), TypedValue::Bool(true));
        assert_eq!(coerce_cell("off"), TypedValue::Bool(false));
        assert_eq!(coerce_cell("N"), TypedValue::Bool(false));

        assert_eq!(coerce_cell("30"), TypedValue::Integer(30));
        assert_eq!(coerce_cell(" -42 "), TypedValue::Integer(-42));
        assert_eq!(coerce_cell("+7"), TypedValue::Integer(7));
        assert_eq!(coerce_cell("007"), TypedValue::Integer(7));

        assert_eq!(coerce_cell("1.5"), TypedValue::Float(1.5));
        assert_eq!(coerce_cell("2.0"), TypedValue::Float(2.0));
        assert_eq!(coerce_cell("1e3"), TypedValue::Float(1000.0));
        assert_eq!(coerce_cell("1E-2"), TypedValue::Float(0.01));

        assert_eq!(coerce_cell("2024-02-29"), TypedValue::Text("2024-02-29".into()));
        assert_eq!(coerce_cell("12/31/2023"), TypedValue::Text("12/31/2023".into()));
        assert_eq!(coerce_cell(" hello "), TypedValue::Text("hello".into()));
    }

    #[test]
    fn test_non_finite_and_odd_numbers_are_text() {
        assert_eq!(coerce_cell("inf"), TypedValue::Text("inf".into()));
        assert_eq!(coerce_cell("1e999"), TypedValue::Text("1e999".into()));
        assert_eq!(coerce_cell("0x10"), TypedValue::Text("0x10".into()));
        assert_eq!(coerce_cell("1,000"), TypedValue::Text("1,000".into()));
    }

    #[test]
    fn test_huge_integer_stays_float() {
        assert_eq!(coerce_cell("123456789012345678901234"), TypedValue::Float(1.2345678901234568e23));
    }

    #[test]
    fn test_calendar_dates() {
        assert!(is_calendar_date("2024-02-29"));
        assert!(!is_calendar_date("2023-02-29"));
        assert!(is_calendar_date("01-15-2024"));
        assert!(!is_calendar_date("13/01/2024"));
        assert!(!is_calendar_date("2024-01-15T10:00"));
    }

    #[test]
    fn test_text_is_fixed_point() {
        for raw in ["hello", "  spaced  ", "2024-01-15", "1,000", "inf", "x.y", "Bob"] {
            let first = coerce_cell(raw);
            if let TypedValue::Text(_) = first {
                assert_eq!(coerce_cell(&first.to_string()), first);
            }
        }
    }

    #[test]
    fn test_normalize_prunes_empty_rows_and_columns() {
        let raw = table(
            &["Name", "Empty", "Age"],
            &[&["Bob", "", "30"], &["", " ", "NA"], &["Eve", "", "n/a"]],
        );
        let dataset = normalize(&raw);

        assert_eq!(dataset.columns, vec!["name", "age"]);
        assert_eq!(dataset.empty_rows_removed, 1);
        assert_eq!(dataset.empty_columns_removed, 1);
        assert_eq!(
            dataset.rows,
            vec![
                vec![TypedValue::Text("Bob".into()), TypedValue::Integer(30)],
                vec![TypedValue::Text("Eve".into()), TypedValue::Null],
            ]
        );
    }

    #[test]
    fn test_normalize_header_only() {
        let dataset = normalize(&table(&["a", "b"], &[]));
        assert!(dataset.rows.is_empty());
        assert!(dataset.columns.is_empty());
        assert_eq!(dataset.empty_columns_removed, 2);
    }
}
