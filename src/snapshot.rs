//! One consistent read of a remote object, and its projection onto the
//! descriptor schema.

use crate::error::ProviderError;
use crate::identifier::Identifier;
use crate::remote::{CallContext, ParameterScope, ParameterValue, RemoteClient, ShowFilter};
use crate::schema::{AttributeDescriptor, ResourceSchema, Source};
use crate::value::{Attributes, Record, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub identifier: Identifier,
    /// SHOW row merged with DESCRIBE output.
    pub object: Record,
    pub show_output: Record,
    /// Only the parameters the schema declares.
    pub parameters: Vec<ParameterValue>,
}

impl RemoteSnapshot {
    pub fn parameter(&self, key: &str) -> Option<&ParameterValue> {
        self.parameters.iter().find(|p| p.key == key)
    }

    /// Value the remote reports for `attr`, `None` when it has none.
    pub fn value_of(&self, schema: &ResourceSchema, attr: &AttributeDescriptor) -> Option<Value> {
        match &attr.source {
            Source::Identity(part) => schema.identity_value(*part, &self.identifier),
            Source::Property(key) => self.object.get(*key).cloned(),
            Source::Parameter(key) => self.parameter(key).map(|p| p.value.clone()),
            Source::FullyQualifiedName => Some(Value::from(self.identifier.fully_qualified_name())),
            Source::CreateOnly(_) | Source::None => None,
        }
    }

    /// Every descriptor-known attribute the remote can report.
    pub fn hydrate(&self, schema: &ResourceSchema) -> Attributes {
        schema
            .attributes()
            .iter()
            .filter_map(|attr| {
                self.value_of(schema, attr)
                    .map(|v| (attr.name.to_string(), v))
            })
            .collect()
    }

    /// Remote values projected onto the schema, keeping the spelling from
    /// `preferred` wherever the remote considers the two equal. Attributes
    /// the remote never reports keep their preferred value.
    pub fn settle(&self, schema: &ResourceSchema, preferred: &Attributes) -> Attributes {
        let mut settled = Attributes::new();
        for attr in schema.attributes() {
            let kept = preferred.get(attr.name);
            let value = match attr.source {
                Source::CreateOnly(_) | Source::None => kept.cloned(),
                _ => match (self.value_of(schema, attr), kept) {
                    (Some(remote), Some(kept)) if attr.values_equal(kept, &remote) => {
                        Some(kept.clone())
                    }
                    (remote, _) => remote,
                },
            };
            if let Some(value) = value {
                settled.insert(attr.name.to_string(), value);
            }
        }
        settled
    }
}

/// Read the object at `identifier`; `Ok(None)` when it does not exist.
pub async fn read(
    client: &dyn RemoteClient,
    ctx: &CallContext,
    schema: &ResourceSchema,
    identifier: &Identifier,
) -> Result<Option<RemoteSnapshot>, ProviderError> {
    let kind = schema.kind;
    let filter = ShowFilter::exact(identifier);
    let rows = ctx.read("show", || client.show(kind, &filter)).await?;

    // LIKE is case-insensitive; identity is not.
    let Some(row) = rows.into_iter().find(|o| &o.identifier == identifier) else {
        return Ok(None);
    };

    let described = match ctx.read("describe", || client.describe(kind, identifier)).await {
        Ok(record) => record,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut object = row.properties.clone();
    object.extend(described);

    let parameters = if schema.has_parameters() {
        let scope = ParameterScope::Object {
            kind,
            identifier: identifier.clone(),
        };
        let keys: Vec<&str> = schema.parameters().filter_map(|a| a.remote_key()).collect();
        ctx.read("show_parameters", || client.show_parameters(&scope))
            .await?
            .into_iter()
            .filter(|p| keys.contains(&p.key.as_str()))
            .collect()
    } else {
        Vec::new()
    };

    Ok(Some(RemoteSnapshot {
        identifier: identifier.clone(),
        object,
        show_output: row.properties,
        parameters,
    }))
}
