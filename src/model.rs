use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An item-master record as returned by the upstream search.
///
/// Only `ItemId` is required; every other attribute may be absent or null and
/// measurements arrive as either numbers or strings depending on how they were
/// last written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    #[serde(deserialize_with = "item_id_text")]
    pub item_id: String,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub original_length: Option<Value>,
    #[serde(default)]
    pub original_width: Option<Value>,
    #[serde(default)]
    pub original_height: Option<Value>,
    #[serde(default)]
    pub original_weight: Option<Value>,
    #[serde(default)]
    pub image_url: Option<Value>,
}

fn item_id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EditableField {
    Description,
    OriginalLength,
    OriginalWidth,
    OriginalHeight,
    OriginalWeight,
}

impl EditableField {
    pub const ALL: [EditableField; 5] = [
        EditableField::Description,
        EditableField::OriginalLength,
        EditableField::OriginalWidth,
        EditableField::OriginalHeight,
        EditableField::OriginalWeight,
    ];

    /// Wire name used by the item-master API.
    pub fn name(self) -> &'static str {
        match self {
            EditableField::Description => "Description",
            EditableField::OriginalLength => "OriginalLength",
            EditableField::OriginalWidth => "OriginalWidth",
            EditableField::OriginalHeight => "OriginalHeight",
            EditableField::OriginalWeight => "OriginalWeight",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, EditableField::Description)
    }
}

/// The five editable attributes of an item, all held as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues {
    pub description: String,
    pub original_length: String,
    pub original_width: String,
    pub original_height: String,
    pub original_weight: String,
}

impl FieldValues {
    pub fn get(&self, field: EditableField) -> &str {
        match field {
            EditableField::Description => &self.description,
            EditableField::OriginalLength => &self.original_length,
            EditableField::OriginalWidth => &self.original_width,
            EditableField::OriginalHeight => &self.original_height,
            EditableField::OriginalWeight => &self.original_weight,
        }
    }

    pub fn set(&mut self, field: EditableField, value: impl Into<String>) {
        let slot = match field {
            EditableField::Description => &mut self.description,
            EditableField::OriginalLength => &mut self.original_length,
            EditableField::OriginalWidth => &mut self.original_width,
            EditableField::OriginalHeight => &mut self.original_height,
            EditableField::OriginalWeight => &mut self.original_weight,
        };
        *slot = value.into();
    }

    pub fn from_item(item: &Item) -> Self {
        let text = |v: &Option<Value>| v.as_ref().map(scalar_text).unwrap_or_default();
        FieldValues {
            description: text(&item.description),
            original_length: text(&item.original_length),
            original_width: text(&item.original_width),
            original_height: text(&item.original_height),
            original_weight: text(&item.original_weight),
        }
    }
}

/// Last known-good state of a loaded item, used as the diff baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub item_id: String,
    pub fields: FieldValues,
    pub image_url: String,
}

impl ItemSnapshot {
    pub fn from_item(item: &Item) -> Self {
        ItemSnapshot {
            item_id: item.item_id.clone(),
            fields: FieldValues::from_item(item),
            image_url: item.image_url.as_ref().map(scalar_text).unwrap_or_default(),
        }
    }

    /// Folds a successful save back into the baseline. `ItemId` never changes.
    pub fn apply_saved(&mut self, current: &FieldValues, image_url: Option<&str>) {
        self.fields = current.clone();
        if let Some(url) = image_url {
            self.image_url = url.to_string();
        }
    }
}

/// Renders a JSON scalar the way the browser displays it in an input box:
/// null becomes empty, integral floats drop their fraction.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64().unwrap_or_default();
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{}", f as i64)
                } else {
                    f.to_string()
                }
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_deserialize_with_missing_fields() {
        let item: Item = serde_json::from_value(json!({
            "ItemId": "A1",
            "Description": "Widget",
            "OriginalLength": 5,
            "OriginalWeight": null
        }))
        .unwrap();

        assert_eq!(item.item_id, "A1");
        assert_eq!(item.original_length, Some(json!(5)));
        assert_eq!(item.original_weight, None);
        assert_eq!(item.image_url, None);
    }

    #[test]
    fn test_numeric_item_id_is_stringified() {
        let item: Item = serde_json::from_value(json!({ "ItemId": 1234 })).unwrap();
        assert_eq!(item.item_id, "1234");
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(&Value::Null), "");
        assert_eq!(scalar_text(&json!("abc")), "abc");
        assert_eq!(scalar_text(&json!(5)), "5");
        assert_eq!(scalar_text(&json!(5.0)), "5");
        assert_eq!(scalar_text(&json!(12.5)), "12.5");
    }

    #[test]
    fn test_snapshot_from_item() {
        let item: Item = serde_json::from_value(json!({
            "ItemId": "A1",
            "Description": null,
            "OriginalHeight": "3.25",
            "ImageUrl": "https://cdn.example.com/a.jpg"
        }))
        .unwrap();

        let snap = ItemSnapshot::from_item(&item);
        assert_eq!(snap.fields.description, "");
        assert_eq!(snap.fields.get(EditableField::OriginalHeight), "3.25");
        assert_eq!(snap.image_url, "https://cdn.example.com/a.jpg");
    }

    #[test]
    fn test_apply_saved_keeps_item_id() {
        let mut snap = ItemSnapshot {
            item_id: "A1".to_string(),
            fields: FieldValues::default(),
            image_url: String::new(),
        };
        let mut current = FieldValues::default();
        current.set(EditableField::Description, "new");

        snap.apply_saved(&current, Some("https://x/y.jpg"));

        assert_eq!(snap.item_id, "A1");
        assert_eq!(snap.fields.description, "new");
        assert_eq!(snap.image_url, "https://x/y.jpg");

        snap.apply_saved(&FieldValues::default(), None);
        assert_eq!(snap.image_url, "https://x/y.jpg");
    }
}
