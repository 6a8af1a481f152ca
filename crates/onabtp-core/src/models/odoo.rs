//! Deserializers for Odoo's loosely typed field values.
//!
//! Odoo sends `false` for any unset field regardless of its type, and
//! relational (many2one) fields as an `[id, display_name]` pair.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A resolved many2one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Many2One {
    pub id: i64,
    pub name: String,
}

/// Deserialize `[id, name]` into `Some(Many2One)`; `false`, `null` or an
/// empty pair become `None`.
pub fn many2one<'de, D>(deserializer: D) -> Result<Option<Many2One>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.first().and_then(Value::as_i64).map(|id| Many2One {
            id,
            name: items
                .get(1)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        _ => None,
    })
}

/// Deserialize any value where `false` or `null` mean "not set".
///
/// Not meant for boolean fields, where `false` is a real value.
pub fn falsy<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Bool(false) | Value::Null => Ok(None),
        other => T::deserialize(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "many2one")]
        partner_id: Option<Many2One>,
        #[serde(default, deserialize_with = "falsy")]
        city: Option<String>,
        #[serde(default, deserialize_with = "falsy")]
        progress: Option<f64>,
    }

    #[test]
    fn test_many2one_pair() {
        let row: Row = serde_json::from_str(r#"{"partner_id": [5, "Acme"]}"#).expect("parse");
        assert_eq!(
            row.partner_id,
            Some(Many2One {
                id: 5,
                name: "Acme".to_string()
            })
        );
    }

    #[test]
    fn test_false_values() {
        let row: Row =
            serde_json::from_str(r#"{"partner_id": false, "city": false, "progress": false}"#)
                .expect("parse");
        assert!(row.partner_id.is_none());
        assert!(row.city.is_none());
        assert!(row.progress.is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let row: Row = serde_json::from_str("{}").expect("parse");
        assert!(row.partner_id.is_none());
        assert!(row.city.is_none());
    }

    #[test]
    fn test_real_values_kept() {
        let row: Row = serde_json::from_str(r#"{"city": "Dakar", "progress": 42.5}"#).expect("parse");
        assert_eq!(row.city.as_deref(), Some("Dakar"));
        assert_eq!(row.progress, Some(42.5));
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let result = serde_json::from_str::<Row>(r#"{"progress": "lots"}"#);
        assert!(result.is_err());
    }
}
