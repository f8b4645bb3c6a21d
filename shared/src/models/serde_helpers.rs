//! Serde helpers for nullable columns coming back from the store
//!
//! The store returns `null` for columns that were never written; these helpers
//! map `null` to the field's default instead of failing the whole row.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

/// Deserialize any `Default` type, treating null as `T::default()`
pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Deserialize a store-derived enum column, mapping null or unrecognised
/// values to `T::default()`
///
/// 只用于引擎会重新计算或有明确缺省值的列，其它列应严格解码。
pub fn lenient_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

/// Deserialize bool that treats null as true
pub fn bool_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<bool>::deserialize(deserializer).map(|opt| opt.unwrap_or(true))
}

/// Deserialize bool that treats null as false
pub fn bool_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<bool>::deserialize(deserializer).map(|opt| opt.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "null_default")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "bool_true")]
        active: bool,
        #[serde(default, deserialize_with = "bool_false")]
        main: bool,
    }

    #[derive(Debug, Default, PartialEq, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Kind {
        #[default]
        Plain,
        Special,
    }

    #[derive(Debug, Deserialize)]
    struct Tagged {
        #[serde(default, deserialize_with = "lenient_default")]
        kind: Kind,
    }

    #[test]
    fn test_nulls_become_defaults() {
        let row: Row = serde_json::from_str(r#"{"tags":null,"active":null,"main":null}"#).unwrap();
        assert!(row.tags.is_empty());
        assert!(row.active);
        assert!(!row.main);
    }

    #[test]
    fn test_values_pass_through() {
        let row: Row = serde_json::from_str(r#"{"tags":["a"],"active":false,"main":true}"#).unwrap();
        assert_eq!(row.tags, vec!["a".to_string()]);
        assert!(!row.active);
        assert!(row.main);
    }

    #[test]
    fn test_lenient_default_absorbs_unknown_values() {
        let row: Tagged = serde_json::from_str(r#"{"kind":"special"}"#).unwrap();
        assert_eq!(row.kind, Kind::Special);

        for json in [r#"{"kind":"archived"}"#, r#"{"kind":null}"#, r#"{"kind":7}"#, "{}"] {
            let row: Tagged = serde_json::from_str(json).unwrap();
            assert_eq!(row.kind, Kind::Plain, "{json}");
        }
    }
}
