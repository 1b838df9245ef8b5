//! Attribute Descriptor Registry.
//!
//! Each resource type declares its attributes once; the reconciler, executor,
//! import path and protocol schema views are all driven from these
//! descriptors.

mod validation;

use std::collections::BTreeMap;

use crate::diagnostics::{AttributePath, Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::identifier::{Identifier, IdentifierKind};
use crate::remote::{ObjectKind, ParameterLevel};
use crate::value::{Attributes, Config, Value};

pub use validation::{Constraint, Validator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Bool,
    Int,
    /// Case-insensitive membership; the user's casing is preserved.
    Enum(&'static [&'static str]),
    StringSet,
    ListOfRecord(Vec<AttributeDescriptor>),
    SetOfRecord(Vec<AttributeDescriptor>),
}

impl AttributeType {
    pub fn label(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Bool => "bool",
            AttributeType::Int => "int",
            AttributeType::Enum(_) => "enum",
            AttributeType::StringSet => "set(string)",
            AttributeType::ListOfRecord(_) => "list(object)",
            AttributeType::SetOfRecord(_) => "set(object)",
        }
    }

    pub fn fields(&self) -> Option<&[AttributeDescriptor]> {
        match self {
            AttributeType::ListOfRecord(f) | AttributeType::SetOfRecord(f) => Some(f),
            _ => None,
        }
    }
}

/// Ordered scopes at which the remote may hold a parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeStack(pub Vec<ParameterLevel>);

impl ScopeStack {
    pub fn account_and_object() -> Self {
        Self(vec![
            ParameterLevel::Default,
            ParameterLevel::Account,
            ParameterLevel::Object,
        ])
    }

    pub fn levels(&self) -> &[ParameterLevel] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    /// Change forces destroy + create
    Structural,
    Updatable,
    /// Identity attribute the remote can change in place
    Rename,
    Computed,
    Parameter(ScopeStack),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPart {
    Database,
    Schema,
    Name,
}

/// Where an attribute's value comes from when reading the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Identity(IdentityPart),
    Property(&'static str),
    Parameter(&'static str),
    FullyQualifiedName,
    /// Sent on create under the given key, never read back.
    CreateOnly(&'static str),
    /// Host-side only, never sent nor read.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: &'static str,
    pub ty: AttributeType,
    pub presence: Presence,
    pub category: Category,
    pub source: Source,
    pub validators: Vec<Validator>,
    pub description: &'static str,
    pub sensitive: bool,
    pub case_insensitive: bool,
}

impl AttributeDescriptor {
    pub fn new(name: &'static str, ty: AttributeType) -> Self {
        let case_insensitive = matches!(ty, AttributeType::Enum(_));
        Self {
            name,
            ty,
            presence: Presence::Optional,
            category: Category::Updatable,
            source: Source::Property(name),
            validators: Vec::new(),
            description: "",
            sensitive: false,
            case_insensitive,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, AttributeType::String)
    }

    pub fn bool(name: &'static str) -> Self {
        Self::new(name, AttributeType::Bool)
    }

    pub fn int(name: &'static str) -> Self {
        Self::new(name, AttributeType::Int)
    }

    pub fn enumeration(name: &'static str, values: &'static [&'static str]) -> Self {
        Self::new(name, AttributeType::Enum(values))
    }

    pub fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    pub fn structural(mut self) -> Self {
        self.category = Category::Structural;
        self
    }

    pub fn renamable(mut self) -> Self {
        self.category = Category::Rename;
        self
    }

    pub fn computed(mut self) -> Self {
        self.category = Category::Computed;
        self
    }

    pub fn identity(mut self, part: IdentityPart) -> Self {
        self.source = Source::Identity(part);
        self
    }

    /// Remote property name when it differs from the attribute name.
    pub fn remote(mut self, key: &'static str) -> Self {
        self.source = Source::Property(key);
        self
    }

    pub fn parameter(mut self, key: &'static str) -> Self {
        self.category = Category::Parameter(ScopeStack::account_and_object());
        self.source = Source::Parameter(key);
        self
    }

    pub fn write_on_create(mut self) -> Self {
        let key = self.remote_key().unwrap_or(self.name);
        self.source = Source::CreateOnly(key);
        self
    }

    pub fn host_only(mut self) -> Self {
        self.source = Source::None;
        self
    }

    pub fn fully_qualified_name(mut self) -> Self {
        self.category = Category::Computed;
        self.source = Source::FullyQualifiedName;
        self
    }

    pub fn validate_with(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn ignore_case(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }

    pub fn is_computed(&self) -> bool {
        self.category == Category::Computed
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.category, Category::Parameter(_))
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.source, Source::Identity(_))
    }

    pub fn is_write_on_create(&self) -> bool {
        matches!(self.source, Source::CreateOnly(_))
    }

    pub fn remote_key(&self) -> Option<&'static str> {
        match self.source {
            Source::Property(k) | Source::Parameter(k) | Source::CreateOnly(k) => Some(k),
            _ => None,
        }
    }

    /// Equality as the remote sees it: enum and flagged strings compare
    /// case-insensitively, sets ignore order.
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (&self.ty, a, b) {
            (_, Value::String(x), Value::String(y)) if self.case_insensitive => {
                x.eq_ignore_ascii_case(y)
            }
            (AttributeType::StringSet, Value::List(x), Value::List(y)) => {
                let mut x: Vec<&Value> = x.iter().collect();
                let mut y: Vec<&Value> = y.iter().collect();
                x.sort_by_key(|v| v.to_string());
                y.sort_by_key(|v| v.to_string());
                x == y
            }
            (AttributeType::ListOfRecord(fields), Value::List(x), Value::List(y)) => {
                x.len() == y.len()
                    && x.iter().zip(y).all(|(a, b)| records_equal(fields, a, b))
            }
            (AttributeType::SetOfRecord(fields), Value::List(x), Value::List(y)) => {
                x.len() == y.len()
                    && x.iter().all(|a| y.iter().any(|b| records_equal(fields, a, b)))
                    && y.iter().all(|b| x.iter().any(|a| records_equal(fields, a, b)))
            }
            _ => a == b,
        }
    }

    pub fn optional_values_equal(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.values_equal(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

fn records_equal(fields: &[AttributeDescriptor], a: &Value, b: &Value) -> bool {
    match (a.as_record(), b.as_record()) {
        (Some(ra), Some(rb)) => {
            fields
                .iter()
                .all(|f| f.optional_values_equal(ra.get(f.name), rb.get(f.name)))
                && ra.keys().chain(rb.keys()).all(|k| fields.iter().any(|f| f.name == k.as_str()))
        }
        _ => a == b,
    }
}

/// Attributes plus cross-attribute rules; shared by resources, data sources
/// and the provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub attributes: Vec<AttributeDescriptor>,
    pub constraints: Vec<Constraint>,
}

impl Block {
    pub fn new(attributes: Vec<AttributeDescriptor>) -> Self {
        Self {
            attributes,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Run every per-attribute validator and resource-level constraint.
    ///
    /// All problems are collected; nothing here touches the remote.
    pub fn validate(&self, config: &Config) -> Diagnostics {
        let mut diags = Diagnostics::new();

        for name in config.names() {
            if self.attribute(name).is_none() {
                diags.push(
                    Diagnostic::error(format!("unsupported argument \"{name}\""))
                        .at(AttributePath::root(name)),
                );
            }
        }

        for attr in &self.attributes {
            let value = config.get(attr.name);
            let path = AttributePath::root(attr.name);
            if attr.is_computed() {
                if !value.is_absent() {
                    diags.push(
                        Diagnostic::error(format!(
                            "\"{}\" is computed and cannot be set in configuration",
                            attr.name
                        ))
                        .at(path),
                    );
                }
                continue;
            }
            match value.as_set() {
                Some(v) => validation::validate_value(attr, &path, v, &mut diags),
                None if attr.is_required() => diags.push(
                    Diagnostic::error(format!("the argument \"{}\" is required", attr.name))
                        .at(path),
                ),
                None => {}
            }
        }

        for constraint in &self.constraints {
            constraint.check(config, &mut diags);
        }

        diags
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    pub kind: ObjectKind,
    pub version: u64,
    pub description: &'static str,
    pub preview_feature: Option<&'static str>,
    pub block: Block,
}

impl ResourceSchema {
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.block.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.block.attribute(name)
    }

    pub fn identifier_kind(&self) -> IdentifierKind {
        self.kind.identifier_kind()
    }

    pub fn parameters(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes().iter().filter(|a| a.is_parameter())
    }

    pub fn has_parameters(&self) -> bool {
        self.parameters().next().is_some()
    }

    fn identity_attribute(&self, part: IdentityPart) -> Option<&AttributeDescriptor> {
        self.attributes()
            .iter()
            .find(|a| a.source == Source::Identity(part))
    }

    fn identity_parts(&self) -> Vec<IdentityPart> {
        match self.identifier_kind() {
            IdentifierKind::Account => vec![IdentityPart::Name],
            IdentifierKind::Database => vec![IdentityPart::Database, IdentityPart::Name],
            IdentifierKind::Schema => vec![
                IdentityPart::Database,
                IdentityPart::Schema,
                IdentityPart::Name,
            ],
        }
    }

    /// Identifier named by the identity attributes of `config`.
    pub fn identifier_from_config(&self, config: &Config) -> Result<Identifier, ProviderError> {
        let mut parts = Vec::new();
        for part in self.identity_parts() {
            let attr = self.identity_attribute(part).ok_or_else(|| {
                ProviderError::internal(
                    "identity-descriptor",
                    format!("{} has no {part:?} identity attribute", self.type_name),
                )
            })?;
            let value = config.get_str(attr.name).ok_or_else(|| {
                ProviderError::Validation(
                    Diagnostic::error(format!("the argument \"{}\" is required", attr.name))
                        .at(AttributePath::root(attr.name))
                        .into(),
                )
            })?;
            parts.push(value);
        }
        Ok(Identifier::from_parts(self.identifier_kind(), &parts)?)
    }

    /// Identifier recorded in a stored attribute map.
    pub fn identifier_from_attributes(
        &self,
        attributes: &Attributes,
    ) -> Result<Identifier, ProviderError> {
        let mut parts = Vec::new();
        for part in self.identity_parts() {
            let value = self
                .identity_attribute(part)
                .and_then(|a| attributes.get(a.name))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ProviderError::internal(
                        "identity-in-state",
                        format!("{} state lacks its {part:?} attribute", self.type_name),
                    )
                })?;
            parts.push(value);
        }
        Ok(Identifier::from_parts(self.identifier_kind(), &parts)?)
    }

    /// Value an identity attribute takes for `identifier`.
    pub fn identity_value(&self, part: IdentityPart, identifier: &Identifier) -> Option<Value> {
        let raw = match part {
            IdentityPart::Name => Some(identifier.name()),
            IdentityPart::Database => identifier.database_name(),
            IdentityPart::Schema => identifier.schema_name(),
        };
        raw.map(Value::from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceSchema {
    pub type_name: &'static str,
    pub kind: ObjectKind,
    pub description: &'static str,
    pub preview_feature: Option<&'static str>,
    pub block: Block,
    /// Computed list attribute receiving the matched objects.
    pub output: &'static str,
}

/// All resource and data-source schemas served by one provider backend.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    provider: Block,
    resources: BTreeMap<&'static str, ResourceSchema>,
    data_sources: BTreeMap<&'static str, DataSourceSchema>,
}

impl Registry {
    pub fn new(provider: Block) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    pub fn with_resource(mut self, schema: ResourceSchema) -> Self {
        self.resources.insert(schema.type_name, schema);
        self
    }

    pub fn with_data_source(mut self, schema: DataSourceSchema) -> Self {
        self.data_sources.insert(schema.type_name, schema);
        self
    }

    pub fn provider_block(&self) -> &Block {
        &self.provider
    }

    pub fn resource(&self, type_name: &str) -> Result<&ResourceSchema, ProviderError> {
        self.resources
            .get(type_name)
            .ok_or_else(|| {
                ProviderError::Protocol(format!("unknown resource type \"{type_name}\""))
            })
    }

    pub fn data_source(&self, type_name: &str) -> Result<&DataSourceSchema, ProviderError> {
        self.data_sources.get(type_name).ok_or_else(|| {
            ProviderError::Protocol(format!("unknown data source \"{type_name}\""))
        })
    }

    /// Descriptors of a resource type in declaration order.
    pub fn describe(&self, type_name: &str) -> Result<&[AttributeDescriptor], ProviderError> {
        Ok(self.resource(type_name)?.attributes())
    }

    /// Pre-plan validation of a resource or data-source configuration.
    pub fn validate(&self, type_name: &str, config: &Config) -> Result<Diagnostics, ProviderError> {
        if let Some(schema) = self.resources.get(type_name) {
            return Ok(schema.block.validate(config));
        }
        Ok(self.data_source(type_name)?.block.validate(config))
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceSchema> {
        self.resources.values()
    }

    pub fn data_sources(&self) -> impl Iterator<Item = &DataSourceSchema> {
        self.data_sources.values()
    }

    pub fn resource_types(&self) -> Vec<&'static str> {
        self.resources.keys().copied().collect()
    }

    pub fn data_source_types(&self) -> Vec<&'static str> {
        self.data_sources.keys().copied().collect()
    }
}
