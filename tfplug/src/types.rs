//! Core type system for tfplug
//!
//! Terraform values travel as msgpack (and JSON for stored state). They are
//! decoded into [`Dynamic`], and resources work with them through the typed
//! accessors on [`DynamicValue`].

use crate::error::{Result, TfplugError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// msgpack extension type Terraform uses for unknown values
const UNKNOWN_EXT_TYPE: i8 = 0;

/// Name rmp-serde recognises for extension values
const MSGPACK_EXT_STRUCT_NAME: &str = "_ExtStruct";

/// A decoded Terraform value
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    Bool(bool),
    /// All numbers are f64 to match Terraform
    Number(f64),
    String(String),
    /// Lists, sets and tuples
    List(Vec<Dynamic>),
    /// Maps and objects
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    /// True when the value is neither null nor unknown
    pub fn is_known(&self) -> bool {
        !self.is_null() && !self.is_unknown()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Dynamic>> {
        match self {
            Dynamic::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Dynamic>> {
        match self {
            Dynamic::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns true if any nested value is unknown
    pub fn contains_unknown(&self) -> bool {
        match self {
            Dynamic::Unknown => true,
            Dynamic::List(l) => l.iter().any(Dynamic::contains_unknown),
            Dynamic::Map(m) => m.values().any(Dynamic::contains_unknown),
            _ => false,
        }
    }

    /// Replace every nested unknown with null
    pub fn unknowns_to_null(self) -> Dynamic {
        match self {
            Dynamic::Unknown => Dynamic::Null,
            Dynamic::List(l) => Dynamic::List(l.into_iter().map(Dynamic::unknowns_to_null).collect()),
            Dynamic::Map(m) => Dynamic::Map(
                m.into_iter()
                    .map(|(k, v)| (k, v.unknowns_to_null()))
                    .collect(),
            ),
            other => other,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }
}

impl From<&str> for Dynamic {
    fn from(s: &str) -> Self {
        Dynamic::String(s.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(s: String) -> Self {
        Dynamic::String(s)
    }
}

impl From<bool> for Dynamic {
    fn from(b: bool) -> Self {
        Dynamic::Bool(b)
    }
}

impl From<i64> for Dynamic {
    fn from(n: i64) -> Self {
        Dynamic::Number(n as f64)
    }
}

impl<T: Into<Dynamic>> From<Option<T>> for Dynamic {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Dynamic::Null)
    }
}

/// Payload of the unknown extension value: a single zero byte
struct UnknownPayload;

impl Serialize for UnknownPayload {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&[0])
    }
}

impl Serialize for Dynamic {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Dynamic::Null => serializer.serialize_unit(),
            Dynamic::Bool(b) => serializer.serialize_bool(*b),
            Dynamic::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Dynamic::String(s) => serializer.serialize_str(s),
            Dynamic::List(l) => l.serialize(serializer),
            Dynamic::Map(m) => m.serialize(serializer),
            Dynamic::Unknown => serializer.serialize_newtype_struct(
                MSGPACK_EXT_STRUCT_NAME,
                &(UNKNOWN_EXT_TYPE, UnknownPayload),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for Dynamic {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, IgnoredAny, Visitor};
        use std::fmt;

        struct DynamicVisitor;

        impl<'de> Visitor<'de> for DynamicVisitor {
            type Value = Dynamic;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a Terraform value")
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_none<E: de::Error>(self) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Null)
            }

            fn visit_some<D: serde::Deserializer<'de>>(
                self,
                inner: D,
            ) -> std::result::Result<Dynamic, D::Error> {
                Dynamic::deserialize(inner)
            }

            fn visit_bool<E: de::Error>(self, b: bool) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Bool(b))
            }

            fn visit_i64<E: de::Error>(self, n: i64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(n as f64))
            }

            fn visit_u64<E: de::Error>(self, n: u64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(n as f64))
            }

            fn visit_f64<E: de::Error>(self, n: f64) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::Number(n))
            }

            fn visit_str<E: de::Error>(self, s: &str) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(s.to_owned()))
            }

            fn visit_string<E: de::Error>(self, s: String) -> std::result::Result<Dynamic, E> {
                Ok(Dynamic::String(s))
            }

            // rmp-serde surfaces msgpack extensions as newtype structs and
            // Terraform only ever sends extension 0
            fn visit_newtype_struct<D: serde::Deserializer<'de>>(
                self,
                ext: D,
            ) -> std::result::Result<Dynamic, D::Error> {
                IgnoredAny::deserialize(ext)?;
                Ok(Dynamic::Unknown)
            }

            fn visit_seq<A: de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Dynamic, A::Error> {
                let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(Dynamic::List(items))
            }

            fn visit_map<A: de::MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Dynamic, A::Error> {
                let mut entries = HashMap::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Dynamic>()? {
                    entries.insert(key, value);
                }
                Ok(Dynamic::Map(entries))
            }
        }

        deserializer.deserialize_any(DynamicVisitor)
    }
}

/// A config, plan or state object as exchanged with Terraform
///
/// Reads go through `AttributePath`s. The strict getters (`get_string`,
/// `get_bool`, ...) fail on absent or mistyped values; the `get_optional_*`
/// family folds absent, null and unknown into `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self::new(Dynamic::Null)
    }

    pub fn unknown() -> Self {
        Self::new(Dynamic::Unknown)
    }

    /// An empty object, the starting point for building state
    pub fn object() -> Self {
        Self::new(Dynamic::Map(HashMap::new()))
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_unknown(&self) -> bool {
        self.value.is_unknown()
    }

    pub fn encode_msgpack(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(&self.value).map_err(|e| TfplugError::Encoding(format!("msgpack: {}", e)))
    }

    /// Empty input decodes to null
    pub fn decode_msgpack(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }
        rmp_serde::from_slice(data)
            .map(Self::new)
            .map_err(|e| TfplugError::Decoding(format!("msgpack: {}", e)))
    }

    pub fn encode_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.value).map_err(|e| TfplugError::Encoding(format!("json: {}", e)))
    }

    /// Empty input decodes to null
    pub fn decode_json(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::null());
        }
        serde_json::from_slice(data)
            .map(Self::new)
            .map_err(|e| TfplugError::Decoding(format!("json: {}", e)))
    }

    /// Raw access; missing attributes read as null
    pub fn get(&self, path: &AttributePath) -> Dynamic {
        self.lookup(path).cloned().unwrap_or(Dynamic::Null)
    }

    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        self.typed(path, "string", |v| v.as_str().map(str::to_string))
    }

    pub fn get_i64(&self, path: &AttributePath) -> Result<i64> {
        self.typed(path, "number", |v| v.as_number().map(|n| n as i64))
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        self.typed(path, "bool", Dynamic::as_bool)
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        self.typed(path, "list", |v| v.as_list().cloned())
    }

    pub fn get_optional_string(&self, path: &AttributePath) -> Option<String> {
        self.get_string(path).ok()
    }

    pub fn get_optional_bool(&self, path: &AttributePath) -> Option<bool> {
        self.get_bool(path).ok()
    }

    pub fn get_optional_i64(&self, path: &AttributePath) -> Option<i64> {
        self.get_i64(path).ok()
    }

    /// Strings of a list or set attribute; other elements are skipped
    pub fn get_string_list(&self, path: &AttributePath) -> Vec<String> {
        self.lookup(path)
            .ok()
            .and_then(Dynamic::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// String entries of a map attribute
    pub fn get_string_map(&self, path: &AttributePath) -> HashMap<String, String> {
        self.lookup(path)
            .ok()
            .and_then(Dynamic::as_map)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First element of a list-nested block, if present and known
    pub fn get_block(&self, path: &AttributePath) -> Option<DynamicValue> {
        self.lookup(path)
            .ok()
            .and_then(Dynamic::as_list)
            .and_then(|items| items.first())
            .filter(|block| block.is_known())
            .cloned()
            .map(DynamicValue::new)
    }

    /// Every element of a list-nested block
    pub fn get_blocks(&self, path: &AttributePath) -> Vec<DynamicValue> {
        self.lookup(path)
            .ok()
            .and_then(Dynamic::as_list)
            .map(|items| items.iter().cloned().map(DynamicValue::new).collect())
            .unwrap_or_default()
    }

    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_null(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Null)
    }

    /// Used by planning for computed attributes
    pub fn mark_unknown(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Unknown)
    }

    /// Writes `new_value` at `path`, creating intermediate objects and lists
    ///
    /// An index equal to a list's length appends, which is how block elements
    /// get built one attribute at a time.
    pub fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let missing = || TfplugError::Path(path.to_string());
        let mut current = &mut self.value;
        for (i, step) in parents.iter().enumerate() {
            if current.is_null() {
                *current = Dynamic::Map(HashMap::new());
            }
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    let slot = m.entry(name.clone()).or_insert(Dynamic::Null);
                    if slot.is_null()
                        && matches!(path.steps.get(i + 1), Some(AttributePathStep::ElementKeyInt(_)))
                    {
                        *slot = Dynamic::List(Vec::new());
                    }
                    slot
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    let idx = usize::try_from(*idx).map_err(|_| missing())?;
                    if idx == l.len() {
                        l.push(Dynamic::Null);
                    }
                    l.get_mut(idx).ok_or_else(missing)?
                }
                _ => return Err(missing()),
            };
        }

        if current.is_null() && !matches!(last, AttributePathStep::ElementKeyInt(_)) {
            *current = Dynamic::Map(HashMap::new());
        }
        match (current, last) {
            (Dynamic::Map(m), AttributePathStep::AttributeName(name))
            | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                m.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                let idx = usize::try_from(*idx).map_err(|_| missing())?;
                if idx == l.len() {
                    l.push(new_value);
                } else {
                    *l.get_mut(idx).ok_or_else(missing)? = new_value;
                }
                Ok(())
            }
            _ => Err(missing()),
        }
    }

    fn lookup(&self, path: &AttributePath) -> Result<&Dynamic> {
        path.steps.iter().try_fold(&self.value, |current, step| {
            let next = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => m.get(name),
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => {
                    usize::try_from(*idx).ok().and_then(|idx| l.get(idx))
                }
                _ => None,
            };
            next.ok_or_else(|| TfplugError::Path(path.to_string()))
        })
    }

    fn typed<T>(
        &self,
        path: &AttributePath,
        expected: &'static str,
        extract: impl FnOnce(&Dynamic) -> Option<T>,
    ) -> Result<T> {
        let value = self.lookup(path)?;
        extract(value).ok_or_else(|| TfplugError::TypeMismatch {
            path: path.to_string(),
            expected,
            actual: value.type_name().to_string(),
        })
    }
}

/// Steps from the root object down to one attribute, block element or map entry
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    AttributeName(String),
    ElementKeyString(String),
    ElementKeyInt(i64),
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self::root().attribute(name)
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(self, name: &str) -> Self {
        self.step(AttributePathStep::AttributeName(name.to_string()))
    }

    pub fn index(self, idx: i64) -> Self {
        self.step(AttributePathStep::ElementKeyInt(idx))
    }

    pub fn key(self, key: &str) -> Self {
        self.step(AttributePathStep::ElementKeyString(key.to_string()))
    }

    fn step(mut self, step: AttributePathStep) -> Self {
        self.steps.push(step);
        self
    }
}

/// Renders Terraform's own notation: `network_rules[0].subnet_id`, `tags["env"]`
impl std::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if i == 0 => f.write_str(name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyString(key) => write!(f, "[{:?}]", key)?,
                AttributePathStep::ElementKeyInt(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// Prior state as stored by Terraform, handed to state upgraders
#[derive(Debug, Clone, Default)]
pub struct RawState {
    pub json: Option<Vec<u8>>,
    pub flatmap: Option<HashMap<String, String>>,
}

impl RawState {
    pub fn decode(&self) -> Result<DynamicValue> {
        let json = self.json.as_deref().ok_or_else(|| {
            TfplugError::StateUpgrade("stored state has no JSON form".to_string())
        })?;
        DynamicValue::decode_json(json)
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

#[derive(Debug, Clone, Default)]
pub struct ServerCapabilities {
    pub plan_destroy: bool,
    pub get_provider_schema_optional: bool,
    pub move_resource_state: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub deferral_allowed: bool,
    pub write_only_attributes_allowed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_value_string_access() {
        let mut dv = DynamicValue::object();
        dv.set_string(&AttributePath::new("name"), "test".to_string())
            .unwrap();

        let result = dv.get_string(&AttributePath::new("name")).unwrap();
        assert_eq!(result, "test");
    }

    #[test]
    fn dynamic_value_nested_access() {
        let mut dv = DynamicValue::object();
        let path = AttributePath::new("config").attribute("endpoint");
        dv.set_string(&path, "https://example.com".to_string())
            .unwrap();

        let result = dv.get_string(&path).unwrap();
        assert_eq!(result, "https://example.com");
    }

    #[test]
    fn set_value_appends_block_elements() {
        let mut dv = DynamicValue::object();
        dv.set_string(
            &AttributePath::new("tls").index(0).attribute("mode"),
            "strict".to_string(),
        )
        .unwrap();

        let block = dv.get_block(&AttributePath::new("tls")).unwrap();
        assert_eq!(
            block.get_string(&AttributePath::new("mode")).unwrap(),
            "strict"
        );
    }

    #[test]
    fn optional_accessors_treat_null_and_unknown_as_absent() {
        let mut dv = DynamicValue::object();
        dv.set_null(&AttributePath::new("a")).unwrap();
        dv.mark_unknown(&AttributePath::new("b")).unwrap();

        assert_eq!(dv.get_optional_string(&AttributePath::new("a")), None);
        assert_eq!(dv.get_optional_string(&AttributePath::new("b")), None);
        assert_eq!(dv.get_optional_string(&AttributePath::new("c")), None);
    }

    #[test]
    fn msgpack_preserves_unknown_values() {
        let mut dv = DynamicValue::object();
        dv.set_string(&AttributePath::new("name"), "queue".to_string())
            .unwrap();
        dv.mark_unknown(&AttributePath::new("id")).unwrap();

        let bytes = dv.encode_msgpack().unwrap();
        let decoded = DynamicValue::decode_msgpack(&bytes).unwrap();

        assert!(decoded.get(&AttributePath::new("id")).is_unknown());
        assert_eq!(
            decoded.get_string(&AttributePath::new("name")).unwrap(),
            "queue"
        );
    }

    #[test]
    fn unknown_is_encoded_as_terraform_extension() {
        let bytes = DynamicValue::unknown().encode_msgpack().unwrap();
        assert_eq!(bytes, vec![0xd4, 0x00, 0x00]);
    }

    #[test]
    fn null_round_trips_through_msgpack() {
        let bytes = DynamicValue::null().encode_msgpack().unwrap();
        assert_eq!(bytes, vec![0xc0]);
        assert!(DynamicValue::decode_msgpack(&bytes).unwrap().is_null());
        assert!(DynamicValue::decode_msgpack(&[]).unwrap().is_null());
    }

    #[test]
    fn raw_state_decodes_json() {
        let raw = RawState {
            json: Some(br#"{"id":"/subscriptions/x","capacity":2}"#.to_vec()),
            flatmap: None,
        };
        let state = raw.decode().unwrap();
        assert_eq!(state.get_i64(&AttributePath::new("capacity")).unwrap(), 2);
    }

    #[test]
    fn errors_name_the_path() {
        let mut dv = DynamicValue::object();
        dv.set_string(&AttributePath::new("tags").key("env"), "prod".to_string())
            .unwrap();

        let path = AttributePath::new("network_rules").index(0).attribute("subnet_id");
        assert_eq!(path.to_string(), "network_rules[0].subnet_id");
        let err = dv.get_string(&path).unwrap_err();
        assert_eq!(err.to_string(), "no value at network_rules[0].subnet_id");

        let err = dv.get_bool(&AttributePath::new("tags").key("env")).unwrap_err();
        assert_eq!(err.to_string(), r#"expected bool at tags["env"], found string"#);
    }

    #[test]
    fn unknowns_to_null_is_recursive() {
        let value = Dynamic::List(vec![Dynamic::Unknown, Dynamic::Map(HashMap::from([(
            "x".to_string(),
            Dynamic::Unknown,
        )]))]);
        assert!(value.contains_unknown());
        assert!(!value.unknowns_to_null().contains_unknown());
    }
}
