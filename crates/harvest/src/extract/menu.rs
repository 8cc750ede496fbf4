//! Reading child values out of taxonomy responses.

use serde_json::Value;

/// One selectable child of a taxonomy level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// The key value passed down to the next level.
    pub value: String,
    /// Human-readable description, when the response carries one.
    pub label: Option<String>,
}

impl Choice {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: None,
        }
    }
}

/// Read a menu response: `{"menuItem": [{"text": .., "value": ..}, ..]}`.
///
/// `menuItem` may be a list or, when the level has exactly one child, a
/// single object. Both yield a list. Items without a `value` are skipped.
pub fn menu_values(payload: &Value) -> Vec<Choice> {
    let items: Vec<&Value> = match payload.get("menuItem") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| {
            let value = scalar_text(item.get("value")?)?;
            let label = item
                .get("text")
                .and_then(scalar_text)
                .filter(|text| *text != value);
            Some(Choice { value, label })
        })
        .collect()
}

/// Read a results response: `{"<key>": [{"<field>": .., "<label>": ..}, ..]}`.
///
/// A single object under `key` counts as a one-element list.
pub fn results_values(payload: &Value, key: &str, field: &str, label: Option<&str>) -> Vec<Choice> {
    let items: Vec<&Value> = match payload.get(key) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| {
            let value = scalar_text(item.get(field)?)?;
            let label = label.and_then(|l| item.get(l)).and_then(scalar_text);
            Some(Choice { value, label })
        })
        .collect()
}

/// Render a scalar JSON value as key text. Nulls and nested values yield `None`.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_menu_list() {
        let payload = json!({"menuItem": [
            {"text": "2024", "value": "2024"},
            {"text": "2023", "value": "2023"}
        ]});
        let values: Vec<String> = menu_values(&payload).into_iter().map(|c| c.value).collect();
        assert_eq!(values, vec!["2024", "2023"]);
    }

    #[test]
    fn test_menu_singleton() {
        let payload = json!({"menuItem": {"text": "Auto 6-spd", "value": "47001"}});
        let choices = menu_values(&payload);
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].value, "47001");
        assert_eq!(choices[0].label.as_deref(), Some("Auto 6-spd"));
    }

    #[test]
    fn test_menu_missing_or_empty() {
        assert!(menu_values(&json!({})).is_empty());
        assert!(menu_values(&json!({"menuItem": []})).is_empty());
        assert!(menu_values(&json!({"menuItem": null})).is_empty());
    }

    #[test]
    fn test_results_numeric_field() {
        let payload = json!({"Count": 2, "Results": [
            {"VehicleId": 19123, "VehicleDescription": "2024 Acme Roadster"},
            {"VehicleId": 19124}
        ]});
        let choices = results_values(&payload, "Results", "VehicleId", Some("VehicleDescription"));
        assert_eq!(choices[0].value, "19123");
        assert_eq!(choices[0].label.as_deref(), Some("2024 Acme Roadster"));
        assert_eq!(choices[1].label, None);
    }

    #[test]
    fn test_results_skips_null_values() {
        let payload = json!({"results": [{"make": null}, {"make": "ACME"}]});
        let choices = results_values(&payload, "results", "make", None);
        assert_eq!(choices, vec![Choice::new("ACME")]);
    }
}
