//! Field reconciliation between a loaded item and the user's edits.
//!
//! The change-set only ever names fields whose text differs from the
//! baseline. Comparison is purely textual: `"5"` and `"5.0"` are different
//! values even though they describe the same measurement.

use serde_json::{Map, Number, Value};

use crate::model::{EditableField, FieldValues};

/// Editable field name to new value. `Value::Null` clears the field upstream.
pub type ChangeSet = Map<String, Value>;

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub fn changed_fields(baseline: &FieldValues, current: &FieldValues) -> ChangeSet {
    let mut out = ChangeSet::new();

    for field in EditableField::ALL {
        let before = baseline.get(field);
        let after = current.get(field).trim();
        if before == after {
            continue;
        }

        let value = if after.is_empty() {
            Value::Null
        } else if field.is_numeric() {
            parse_decimal(after).unwrap_or_else(|| Value::String(after.to_string()))
        } else {
            Value::String(after.to_string())
        };
        out.insert(field.name().to_string(), value);
    }

    out
}

/// Parses a finite decimal into a JSON number. Integral values become JSON
/// integers so `"12"` is sent as `12` rather than `12.0`.
pub fn parse_decimal(s: &str) -> Option<Value> {
    let parsed: f64 = s.trim().parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    if parsed.fract() == 0.0 && parsed.abs() <= MAX_SAFE_INTEGER {
        return Some(Value::Number(Number::from(parsed as i64)));
    }
    Number::from_f64(parsed).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(d: &str, l: &str, w: &str, h: &str, wt: &str) -> FieldValues {
        FieldValues {
            description: d.to_string(),
            original_length: l.to_string(),
            original_width: w.to_string(),
            original_height: h.to_string(),
            original_weight: wt.to_string(),
        }
    }

    #[test]
    fn test_unchanged_fields_produce_empty_change_set() {
        let baseline = values("Widget", "5", "", "2.5", "abc");
        let current = baseline.clone();
        assert!(changed_fields(&baseline, &current).is_empty());
    }

    #[test]
    fn test_cleared_fields_map_to_null() {
        let baseline = values("Widget", "5", "6", "7", "8");
        let current = values("", "", "", "", "");
        let changes = changed_fields(&baseline, &current);

        assert_eq!(changes.len(), 5);
        for field in EditableField::ALL {
            assert_eq!(changes.get(field.name()), Some(&Value::Null), "{}", field.name());
        }
    }

    #[test]
    fn test_numeric_field_emits_number() {
        let baseline = values("", "", "", "", "");
        let mut current = baseline.clone();
        current.set(EditableField::OriginalLength, "12.5");
        current.set(EditableField::OriginalWidth, "12");

        let changes = changed_fields(&baseline, &current);
        assert_eq!(changes.get("OriginalLength"), Some(&json!(12.5)));
        assert_eq!(changes.get("OriginalWidth"), Some(&json!(12)));
    }

    #[test]
    fn test_non_numeric_input_in_numeric_field_is_sent_as_string() {
        let baseline = values("", "1", "", "", "");
        let mut current = baseline.clone();
        current.set(EditableField::OriginalLength, "12 in");
        current.set(EditableField::OriginalHeight, "inf");

        let changes = changed_fields(&baseline, &current);
        assert_eq!(changes.get("OriginalLength"), Some(&json!("12 in")));
        assert_eq!(changes.get("OriginalHeight"), Some(&json!("inf")));
    }

    #[test]
    fn test_description_is_never_coerced() {
        let baseline = values("old", "", "", "", "");
        let mut current = baseline.clone();
        current.set(EditableField::Description, "  42 ");

        let changes = changed_fields(&baseline, &current);
        assert_eq!(changes.get("Description"), Some(&json!("42")));
    }

    #[test]
    fn test_formatting_difference_counts_as_change() {
        let baseline = values("", "5", "", "", "");
        let mut current = baseline.clone();
        current.set(EditableField::OriginalLength, "5.0");

        let changes = changed_fields(&baseline, &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("OriginalLength"), Some(&json!(5)));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("3"), Some(json!(3)));
        assert_eq!(parse_decimal("-0.25"), Some(json!(-0.25)));
        assert_eq!(parse_decimal("1e3"), Some(json!(1000)));
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
    }
}
