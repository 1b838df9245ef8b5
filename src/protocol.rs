//! Provider protocol v6.
//!
//! Requests and responses are plain serde enums tagged by `op`; the CLI
//! frames them as NDJSON. Every response carries diagnostics, and a failed
//! operation is reported through them rather than as a transport error.

pub mod upgrade;
pub mod v5;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::executor::Step;
use crate::plan::Plan;
use crate::provider::Provider;
use crate::remote::CallContext;
use crate::schema::{AttributeDescriptor, AttributeType, Block, Registry};
use crate::state::InstanceState;
use crate::value::{Attributes, Config};

pub const PROTOCOL_VERSION: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidateTarget {
    Provider,
    Resource,
    DataSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    GetSchema,
    ValidateConfig {
        target: ValidateTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        type_name: Option<String>,
        config: Config,
    },
    Configure {
        config: Config,
    },
    ReadResource {
        type_name: String,
        state: InstanceState,
    },
    PlanResourceChange {
        type_name: String,
        /// `None` when the instance block was removed.
        #[serde(default)]
        config: Option<Config>,
        #[serde(default)]
        prior_state: Option<InstanceState>,
    },
    ApplyResourceChange {
        type_name: String,
        #[serde(default)]
        prior_state: Option<InstanceState>,
        plan: Plan,
    },
    ImportResourceState {
        type_name: String,
        id: String,
    },
    ReadDataSource {
        type_name: String,
        config: Config,
    },
    UpgradeResourceState {
        type_name: String,
        version: u64,
        raw_state: serde_json::Value,
    },
}

impl Request {
    /// Wire name of the operation.
    pub fn op(&self) -> &'static str {
        match self {
            Request::GetSchema => "get_schema",
            Request::ValidateConfig { .. } => "validate_config",
            Request::Configure { .. } => "configure",
            Request::ReadResource { .. } => "read_resource",
            Request::PlanResourceChange { .. } => "plan_resource_change",
            Request::ApplyResourceChange { .. } => "apply_resource_change",
            Request::ImportResourceState { .. } => "import_resource_state",
            Request::ReadDataSource { .. } => "read_data_source",
            Request::UpgradeResourceState { .. } => "upgrade_resource_state",
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            Request::GetSchema | Request::Configure { .. } => None,
            Request::ValidateConfig { type_name, .. } => type_name.as_deref(),
            Request::ReadResource { type_name, .. }
            | Request::PlanResourceChange { type_name, .. }
            | Request::ApplyResourceChange { type_name, .. }
            | Request::ImportResourceState { type_name, .. }
            | Request::ReadDataSource { type_name, .. }
            | Request::UpgradeResourceState { type_name, .. } => Some(type_name),
        }
    }

    pub fn targets_data_source(&self) -> bool {
        matches!(
            self,
            Request::ReadDataSource { .. }
                | Request::ValidateConfig {
                    target: ValidateTarget::DataSource,
                    ..
                }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Response {
    GetSchema {
        schema: ProviderSchema,
        diagnostics: Diagnostics,
    },
    ValidateConfig {
        diagnostics: Diagnostics,
    },
    Configure {
        diagnostics: Diagnostics,
    },
    ReadResource {
        state: Option<InstanceState>,
        diagnostics: Diagnostics,
    },
    PlanResourceChange {
        plan: Option<Plan>,
        diagnostics: Diagnostics,
    },
    ApplyResourceChange {
        new_state: Option<InstanceState>,
        #[serde(default)]
        completed: Vec<Step>,
        diagnostics: Diagnostics,
    },
    ImportResourceState {
        state: Option<InstanceState>,
        diagnostics: Diagnostics,
    },
    ReadDataSource {
        state: Option<Attributes>,
        diagnostics: Diagnostics,
    },
    UpgradeResourceState {
        state: Option<InstanceState>,
        diagnostics: Diagnostics,
    },
}

impl Response {
    pub fn diagnostics(&self) -> &Diagnostics {
        match self {
            Response::GetSchema { diagnostics, .. }
            | Response::ValidateConfig { diagnostics }
            | Response::Configure { diagnostics }
            | Response::ReadResource { diagnostics, .. }
            | Response::PlanResourceChange { diagnostics, .. }
            | Response::ApplyResourceChange { diagnostics, .. }
            | Response::ImportResourceState { diagnostics, .. }
            | Response::ReadDataSource { diagnostics, .. }
            | Response::UpgradeResourceState { diagnostics, .. } => diagnostics,
        }
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        match self {
            Response::GetSchema { diagnostics, .. }
            | Response::ValidateConfig { diagnostics }
            | Response::Configure { diagnostics }
            | Response::ReadResource { diagnostics, .. }
            | Response::PlanResourceChange { diagnostics, .. }
            | Response::ApplyResourceChange { diagnostics, .. }
            | Response::ImportResourceState { diagnostics, .. }
            | Response::ReadDataSource { diagnostics, .. }
            | Response::UpgradeResourceState { diagnostics, .. } => diagnostics,
        }
    }

    /// Response of the same kind as `request` that carries only `diagnostics`.
    ///
    /// A failed apply hands back the prior state unchanged.
    pub fn failure(request: &Request, diagnostics: Diagnostics) -> Self {
        match request {
            Request::GetSchema => Response::GetSchema {
                schema: ProviderSchema::default(),
                diagnostics,
            },
            Request::ValidateConfig { .. } => Response::ValidateConfig { diagnostics },
            Request::Configure { .. } => Response::Configure { diagnostics },
            Request::ReadResource { .. } => Response::ReadResource {
                state: None,
                diagnostics,
            },
            Request::PlanResourceChange { .. } => Response::PlanResourceChange {
                plan: None,
                diagnostics,
            },
            Request::ApplyResourceChange { prior_state, .. } => Response::ApplyResourceChange {
                new_state: prior_state.clone(),
                completed: Vec::new(),
                diagnostics,
            },
            Request::ImportResourceState { .. } => Response::ImportResourceState {
                state: None,
                diagnostics,
            },
            Request::ReadDataSource { .. } => Response::ReadDataSource {
                state: None,
                diagnostics,
            },
            Request::UpgradeResourceState { .. } => Response::UpgradeResourceState {
                state: None,
                diagnostics,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nesting {
    List,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedSchema {
    pub nesting: Nesting,
    pub attributes: Vec<AttributeSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,
    /// Scalar type; empty for nested attributes.
    #[serde(rename = "type", default)]
    pub ty: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    /// Set when the provider may supply the value.
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<NestedSchema>,
}

impl AttributeSchema {
    pub fn from_descriptor(attr: &AttributeDescriptor) -> Self {
        let (ty, nested) = match &attr.ty {
            AttributeType::ListOfRecord(fields) | AttributeType::SetOfRecord(fields) => {
                let nesting = match attr.ty {
                    AttributeType::SetOfRecord(_) => Nesting::Set,
                    _ => Nesting::List,
                };
                let max_items = attr.validators.iter().find_map(|v| match v {
                    crate::schema::Validator::MaxItems(n) => Some(*n),
                    _ => None,
                });
                let nested = NestedSchema {
                    nesting,
                    attributes: fields.iter().map(Self::from_descriptor).collect(),
                    max_items,
                };
                (String::new(), Some(nested))
            }
            AttributeType::Enum(_) => ("string".to_string(), None),
            other => (other.label().to_string(), None),
        };
        let provider_supplied = attr.is_computed()
            || (!attr.is_required()
                && matches!(
                    attr.source,
                    crate::schema::Source::Property(_)
                        | crate::schema::Source::Parameter(_)
                        | crate::schema::Source::FullyQualifiedName
                ));
        Self {
            name: attr.name.to_string(),
            ty,
            description: attr.description.to_string(),
            required: attr.is_required(),
            optional: !attr.is_required() && !attr.is_computed(),
            computed: provider_supplied,
            sensitive: attr.sensitive,
            nested,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSchema {
    pub attributes: Vec<AttributeSchema>,
}

impl BlockSchema {
    pub fn from_block(block: &Block) -> Self {
        Self {
            attributes: block
                .attributes
                .iter()
                .map(AttributeSchema::from_descriptor)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSchema {
    pub version: u64,
    #[serde(default)]
    pub description: String,
    pub block: BlockSchema,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSchema {
    pub provider: BlockSchema,
    pub resources: BTreeMap<String, TypeSchema>,
    pub data_sources: BTreeMap<String, TypeSchema>,
}

impl ProviderSchema {
    pub fn from_registry(registry: &Registry) -> Self {
        let resources = registry
            .resources()
            .map(|r| {
                let schema = TypeSchema {
                    version: r.version,
                    description: r.description.to_string(),
                    block: BlockSchema::from_block(&r.block),
                };
                (r.type_name.to_string(), schema)
            })
            .collect();
        let data_sources = registry
            .data_sources()
            .map(|d| {
                let schema = TypeSchema {
                    version: 0,
                    description: d.description.to_string(),
                    block: BlockSchema::from_block(&d.block),
                };
                (d.type_name.to_string(), schema)
            })
            .collect();
        Self {
            provider: BlockSchema::from_block(registry.provider_block()),
            resources,
            data_sources,
        }
    }
}

#[async_trait]
pub trait ProviderServer: Send + Sync {
    fn protocol_version(&self) -> u32;

    async fn call(&self, request: Request, ctx: &CallContext) -> Response;
}

fn require_type(type_name: Option<String>) -> Result<String, ProviderError> {
    type_name.ok_or_else(|| ProviderError::Protocol("type_name is required".to_string()))
}

fn diagnostics_of(result: Result<Diagnostics, ProviderError>) -> Diagnostics {
    result.unwrap_or_else(ProviderError::into_diagnostics)
}

/// Native v6 server over one [`Provider`].
pub struct Server {
    provider: Provider,
}

impl Server {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }
}

#[async_trait]
impl ProviderServer for Server {
    fn protocol_version(&self) -> u32 {
        PROTOCOL_VERSION
    }

    async fn call(&self, request: Request, ctx: &CallContext) -> Response {
        let provider = &self.provider;
        match request {
            Request::GetSchema => Response::GetSchema {
                schema: ProviderSchema::from_registry(provider.registry()),
                diagnostics: Diagnostics::new(),
            },
            Request::ValidateConfig {
                target,
                type_name,
                config,
            } => {
                let result = match target {
                    ValidateTarget::Provider => {
                        Ok(provider.registry().provider_block().validate(&config))
                    }
                    ValidateTarget::Resource => require_type(type_name)
                        .and_then(|t| provider.validate_resource_config(&t, &config)),
                    ValidateTarget::DataSource => require_type(type_name)
                        .and_then(|t| provider.validate_data_source_config(&t, &config)),
                };
                Response::ValidateConfig {
                    diagnostics: diagnostics_of(result),
                }
            }
            Request::Configure { config } => Response::Configure {
                diagnostics: provider.configure(&config).await,
            },
            Request::ReadResource { type_name, state } => {
                match provider.read(&type_name, &state, ctx).await {
                    Ok((state, diagnostics)) => Response::ReadResource { state, diagnostics },
                    Err(e) => Response::ReadResource {
                        state: Some(state),
                        diagnostics: e.into_diagnostics(),
                    },
                }
            }
            Request::PlanResourceChange {
                type_name,
                config,
                prior_state,
            } => match provider
                .plan(&type_name, config.as_ref(), prior_state.as_ref(), ctx)
                .await
            {
                Ok(plan) => Response::PlanResourceChange {
                    diagnostics: plan.diagnostics.clone(),
                    plan: Some(plan),
                },
                Err(e) => Response::PlanResourceChange {
                    plan: None,
                    diagnostics: e.into_diagnostics(),
                },
            },
            Request::ApplyResourceChange {
                type_name,
                prior_state,
                plan,
            } => match provider
                .apply(&type_name, prior_state.as_ref(), &plan, ctx)
                .await
            {
                Ok(outcome) => Response::ApplyResourceChange {
                    new_state: outcome.state,
                    completed: outcome.completed,
                    diagnostics: outcome.diagnostics,
                },
                Err(e) => Response::ApplyResourceChange {
                    new_state: prior_state,
                    completed: Vec::new(),
                    diagnostics: e.into_diagnostics(),
                },
            },
            Request::ImportResourceState { type_name, id } => {
                match provider.import(&type_name, &id, ctx).await {
                    Ok(state) => Response::ImportResourceState {
                        state: Some(state),
                        diagnostics: Diagnostics::new(),
                    },
                    Err(e) => Response::ImportResourceState {
                        state: None,
                        diagnostics: e.into_diagnostics(),
                    },
                }
            }
            Request::ReadDataSource { type_name, config } => {
                match provider.read_data_source(&type_name, &config, ctx).await {
                    Ok(state) => Response::ReadDataSource {
                        state: Some(state),
                        diagnostics: Diagnostics::new(),
                    },
                    Err(e) => Response::ReadDataSource {
                        state: None,
                        diagnostics: e.into_diagnostics(),
                    },
                }
            }
            Request::UpgradeResourceState {
                type_name,
                version,
                raw_state,
            } => match provider.upgrade_state(&type_name, version, &raw_state) {
                Ok((state, diagnostics)) => Response::UpgradeResourceState {
                    state: Some(state),
                    diagnostics,
                },
                Err(e) => Response::UpgradeResourceState {
                    state: None,
                    diagnostics: e.into_diagnostics(),
                },
            },
        }
    }
}

/// Error diagnostic for a protocol-level failure.
pub fn protocol_error(message: impl Into<String>) -> Diagnostics {
    Diagnostic::error(message).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{framework_registry, warehouse};

    #[test]
    fn test_request_wire_form() {
        let raw = r#"{"op": "plan_resource_change", "type_name": "snowflake_warehouse",
                      "config": {"name": "W1", "comment": null}}"#;
        let request: Request = serde_json::from_str(raw).unwrap();
        match request {
            Request::PlanResourceChange {
                config: Some(config),
                prior_state: None,
                ..
            } => assert!(config.get("comment").is_null()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_schema_marks_remote_defaults_as_computed() {
        let schema = ProviderSchema::from_registry(&framework_registry());
        let wh = &schema.resources[warehouse::TYPE_NAME].block;
        let size = wh.attributes.iter().find(|a| a.name == "warehouse_size").unwrap();
        assert!(size.optional && size.computed);
        assert_eq!(size.ty, "string");
        let name = wh.attributes.iter().find(|a| a.name == "name").unwrap();
        assert!(name.required && !name.computed);
        let fqn = wh
            .attributes
            .iter()
            .find(|a| a.name == "fully_qualified_name")
            .unwrap();
        assert!(fqn.computed && !fqn.optional);
    }

    #[test]
    fn test_nested_attributes_in_v6_schema() {
        let schema = ProviderSchema::from_registry(&framework_registry());
        let limit = schema.data_sources["snowflake_compute_pools"]
            .block
            .attributes
            .iter()
            .find(|a| a.name == "limit")
            .unwrap();
        let nested = limit.nested.as_ref().unwrap();
        assert_eq!(nested.nesting, Nesting::List);
        assert_eq!(nested.max_items, Some(1));
        assert_eq!(nested.attributes.len(), 2);
    }

    #[test]
    fn test_failed_apply_keeps_prior_state() {
        let request: Request = serde_json::from_value(serde_json::json!({
            "op": "apply_resource_change",
            "type_name": "snowflake_warehouse",
            "prior_state": {
                "schema_version": 1,
                "identifier": {"kind": "account", "name": "W1"},
                "attributes": {"name": "W1"}
            },
            "plan": {
                "resource_type": "snowflake_warehouse",
                "action": "no_op",
                "identifier": {"kind": "account", "name": "W1"},
                "entries": [],
                "planned": {},
                "configured": []
            }
        }))
        .unwrap();
        let response = Response::failure(&request, protocol_error("boom"));
        match response {
            Response::ApplyResourceChange { new_state, .. } => assert!(new_state.is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
