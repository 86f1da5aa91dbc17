//! Schemas for providers, resources and data sources
//!
//! Schemas are assembled with [`SchemaBuilder`], [`AttributeBuilder`] and
//! [`NestedBlockBuilder`]. Besides describing the shape Terraform sees, each
//! attribute carries the validators, plan modifiers and default that the
//! gRPC layer runs during validation and planning.

use crate::types::{AttributePath, Diagnostic, DynamicValue};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Terraform's type system; numbers are always f64
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(BTreeMap<String, AttributeType>),
}

impl AttributeType {
    pub fn list_of(elem: AttributeType) -> Self {
        AttributeType::List(Box::new(elem))
    }

    pub fn set_of(elem: AttributeType) -> Self {
        AttributeType::Set(Box::new(elem))
    }

    pub fn map_of(elem: AttributeType) -> Self {
        AttributeType::Map(Box::new(elem))
    }

    /// cty's JSON type notation, e.g. `"string"` or `["list","string"]`
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Value};

        let collection = |kind: &str, elem: &AttributeType| json!([kind, elem.to_json()]);
        match self {
            AttributeType::String => json!("string"),
            AttributeType::Number => json!("number"),
            AttributeType::Bool => json!("bool"),
            AttributeType::List(elem) => collection("list", elem),
            AttributeType::Set(elem) => collection("set", elem),
            AttributeType::Map(elem) => collection("map", elem),
            AttributeType::Object(fields) => json!([
                "object",
                fields
                    .iter()
                    .map(|(name, t)| (name.clone(), t.to_json()))
                    .collect::<serde_json::Map<String, Value>>()
            ]),
        }
    }

    /// Bytes for the `type` field of a protocol attribute
    pub fn encode(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    /// Bumped whenever stored state needs an upgrader
    pub version: i64,
    pub block: Block,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub version: i64,
    pub attributes: Vec<Attribute>,
    pub block_types: Vec<NestedBlock>,
    pub description: String,
    pub description_kind: StringKind,
    pub deprecated: bool,
}

impl Block {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn nested_block(&self, name: &str) -> Option<&NestedBlock> {
        self.block_types.iter().find(|b| b.type_name == name)
    }
}

#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub default: Option<Arc<dyn Default>>,
    pub deprecated: bool,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let describe = |items: Vec<String>| items.join(", ");
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "validators",
                &describe(self.validators.iter().map(|v| v.description()).collect()),
            )
            .field(
                "plan_modifiers",
                &describe(self.plan_modifiers.iter().map(|m| m.description()).collect()),
            )
            .field("default", &self.default.as_ref().map(|d| d.description()))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct NestedBlock {
    pub type_name: String,
    pub block: Block,
    pub nesting: NestingMode,
    pub min_items: i64,
    pub max_items: i64,
}

/// Mirrors the protocol's nesting modes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NestingMode {
    Invalid,
    Single,
    List,
    Set,
    Map,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum StringKind {
    #[default]
    Plain,
    Markdown,
}

/// Checks one configured value; null and unknown values never reach it
pub trait Validator: Send + Sync {
    fn description(&self) -> String;
    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse;
}

pub struct ValidatorRequest {
    pub config_value: DynamicValue,
    pub path: AttributePath,
}

pub struct ValidatorResponse {
    pub diagnostics: Vec<Diagnostic>,
}

/// Adjusts one planned value and may flag it as forcing replacement
pub trait PlanModifier: Send + Sync {
    fn description(&self) -> String;
    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse;
}

pub struct PlanModifierRequest {
    pub config_value: DynamicValue,
    pub state_value: DynamicValue,
    pub plan_value: DynamicValue,
    pub path: AttributePath,
    /// No prior state exists
    pub creating: bool,
}

pub struct PlanModifierResponse {
    pub plan_value: DynamicValue,
    pub requires_replace: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Value planned when the configuration leaves an attribute null
pub trait Default: Send + Sync {
    fn description(&self) -> String;
    fn default_value(&self, request: DefaultRequest) -> DefaultResponse;
}

pub struct DefaultRequest {
    pub path: AttributePath,
}

pub struct DefaultResponse {
    pub value: DynamicValue,
}

pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, r#type: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                default: None,
                deprecated: false,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    /// Combine with `optional()` for values the API fills in when unset
    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
        self.attribute.validators.push(Arc::from(validator));
        self
    }

    pub fn plan_modifier(mut self, modifier: Box<dyn PlanModifier>) -> Self {
        self.attribute.plan_modifiers.push(Arc::from(modifier));
        self
    }

    /// Also makes the attribute optional and computed, as Terraform requires
    pub fn default(mut self, default: Box<dyn Default>) -> Self {
        self.attribute.default = Some(Arc::from(default));
        self.attribute.required = false;
        self.attribute.optional = true;
        self.attribute.computed = true;
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

pub struct NestedBlockBuilder {
    nested: NestedBlock,
}

impl NestedBlockBuilder {
    pub fn new(type_name: &str, nesting: NestingMode) -> Self {
        Self {
            nested: NestedBlock {
                type_name: type_name.to_string(),
                block: Block::default(),
                nesting,
                min_items: 0,
                max_items: 0,
            },
        }
    }

    /// A list block holding at most one element, the usual ARM sub-object shape
    pub fn single_list(type_name: &str) -> Self {
        Self::new(type_name, NestingMode::List).max_items(1)
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.nested.block.description = desc.to_string();
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.nested.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.nested.block.block_types.push(block);
        self
    }

    pub fn min_items(mut self, min: i64) -> Self {
        self.nested.min_items = min;
        self
    }

    pub fn max_items(mut self, max: i64) -> Self {
        self.nested.max_items = max;
        self
    }

    pub fn build(self) -> NestedBlock {
        self.nested
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    version: i64,
    block: Block,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.block.description = desc.to_string();
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.block.attributes.push(attr);
        self
    }

    pub fn block(mut self, block: NestedBlock) -> Self {
        self.block.block_types.push(block);
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            version: self.version,
            block: Block {
                version: self.version,
                ..self.block
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_builder_creates_required_string() {
        let attr = AttributeBuilder::new("name", AttributeType::String)
            .description("The name of the queue")
            .optional()
            .required()
            .build();

        assert_eq!(attr.name, "name");
        assert_eq!(attr.r#type, AttributeType::String);
        assert!(attr.required);
        assert!(!attr.optional);
        assert_eq!(attr.description, "The name of the queue");
    }

    #[test]
    fn schema_builder_collects_attributes_and_blocks() {
        let schema = SchemaBuilder::new()
            .version(1)
            .description("Backend")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .build(),
            )
            .block(
                NestedBlockBuilder::single_list("tls")
                    .attribute(
                        AttributeBuilder::new("validate_certificate_chain", AttributeType::Bool)
                            .optional()
                            .build(),
                    )
                    .build(),
            )
            .build();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.block.version, 1);
        assert_eq!(schema.block.attributes.len(), 2);
        assert_eq!(schema.block.description_kind, StringKind::Plain);
        assert!(schema.block.attribute("id").unwrap().computed);
        let tls = schema.block.nested_block("tls").unwrap();
        assert_eq!(tls.max_items, 1);
        assert_eq!(tls.nesting, NestingMode::List);
    }

    #[test]
    fn attribute_types_encode_as_cty_json() {
        assert_eq!(AttributeType::String.encode(), b"\"string\"".to_vec());
        assert_eq!(
            AttributeType::set_of(AttributeType::String).encode(),
            br#"["set","string"]"#.to_vec()
        );
        let object = AttributeType::Object(BTreeMap::from([
            ("subnet_id".to_string(), AttributeType::String),
            ("port".to_string(), AttributeType::Number),
        ]));
        assert_eq!(
            AttributeType::list_of(object).encode(),
            br#"["list",["object",{"port":"number","subnet_id":"string"}]]"#.to_vec()
        );
    }

    #[test]
    fn default_makes_attribute_optional_computed() {
        let attr = AttributeBuilder::new("status", AttributeType::String)
            .required()
            .default(crate::defaults::StaticDefault::string("Active"))
            .build();

        assert!(!attr.required);
        assert!(attr.optional && attr.computed);
        assert!(format!("{:?}", attr).contains(r#"defaults to \"Active\""#));
    }
}
