use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// A field-name keyed record, used for list-of-record and set-of-record attributes.
pub type Record = BTreeMap<String, Value>;

/// Concrete attribute values as stored in state and reported by the remote.
pub type Attributes = BTreeMap<String, Value>;

/// A concrete attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Record(record) => {
                write!(f, "{{")?;
                for (i, (k, v)) in record.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

/// Tri-state configuration value.
///
/// `Absent` means the attribute is not mentioned in configuration and the
/// remote owns its value. `Null` is an explicit request to unset it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigValue {
    #[default]
    Absent,
    Null,
    Set(Value),
}

impl ConfigValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, ConfigValue::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn as_set(&self) -> Option<&Value> {
        match self {
            ConfigValue::Set(v) => Some(v),
            _ => None,
        }
    }
}

static ABSENT: ConfigValue = ConfigValue::Absent;

/// Typed configuration tree produced by the host for one instance block.
///
/// On the wire an absent attribute is a missing key and an explicit unset is
/// a JSON `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: BTreeMap<String, ConfigValue>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values
            .insert(name.to_string(), ConfigValue::Set(value.into()));
        self
    }

    pub fn with_null(mut self, name: &str) -> Self {
        self.values.insert(name.to_string(), ConfigValue::Null);
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.values.remove(name);
        self
    }

    pub fn get(&self, name: &str) -> &ConfigValue {
        self.values.get(name).unwrap_or(&ABSENT)
    }

    pub fn set(&mut self, name: &str, value: ConfigValue) {
        if value.is_absent() {
            self.values.remove(name);
        } else {
            self.values.insert(name.to_string(), value);
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).as_set().and_then(Value::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for Config {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, value) in &self.values {
            match value {
                ConfigValue::Absent => {}
                ConfigValue::Null => map.serialize_entry(name, &Option::<Value>::None)?,
                ConfigValue::Set(v) => map.serialize_entry(name, v)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Config {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Option<Value>>::deserialize(deserializer)?;
        let values = raw
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Some(v) => ConfigValue::Set(v),
                    None => ConfigValue::Null,
                };
                (name, value)
            })
            .collect();
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_null_are_distinct() {
        let config = Config::new().with_null("comment");
        assert!(config.get("comment").is_null());
        assert!(config.get("warehouse_size").is_absent());
        assert_ne!(config.get("comment"), config.get("warehouse_size"));
    }

    #[test]
    fn test_config_wire_form_skips_absent_and_keeps_null() {
        let config = Config::new().with("name", "W1").with_null("comment");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json, serde_json::json!({"name": "W1", "comment": null}));

        let back: Config = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
        assert!(back.get("auto_suspend").is_absent());
    }

    #[test]
    fn test_zero_is_a_set_value() {
        let config: Config = serde_json::from_str(r#"{"auto_suspend": 0}"#).unwrap();
        assert_eq!(config.get("auto_suspend"), &ConfigValue::Set(Value::Int(0)));
    }

    #[test]
    fn test_untagged_value_decoding() {
        let value: Value = serde_json::from_str(r#"[{"name": "VAL", "type": "VARCHAR"}]"#).unwrap();
        let list = value.as_list().unwrap();
        let record = list[0].as_record().unwrap();
        assert_eq!(record["name"], Value::from("VAL"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("XSMALL").to_string(), "\"XSMALL\"");
        assert_eq!(Value::from(vec![Value::Int(1), Value::Bool(true)]).to_string(), "[1, true]");
    }
}
