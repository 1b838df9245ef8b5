//! Provider protocol v5.
//!
//! v5 has separate validation calls per target and cannot express nested
//! attributes; record-typed attributes travel as `block_types`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AttributeSchema, Nesting};
use crate::diagnostics::Diagnostics;
use crate::error::ProviderError;
use crate::plan::Plan;
use crate::provider::Provider;
use crate::remote::CallContext;
use crate::schema::{AttributeDescriptor, AttributeType, Block, Registry, Validator};
use crate::state::InstanceState;
use crate::value::{Attributes, Config};

pub const PROTOCOL_VERSION: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    GetSchema,
    PrepareProviderConfig {
        config: Config,
    },
    ValidateResourceTypeConfig {
        type_name: String,
        config: Config,
    },
    ValidateDataSourceConfig {
        type_name: String,
        config: Config,
    },
    Configure {
        config: Config,
    },
    ReadResource {
        type_name: String,
        current_state: InstanceState,
    },
    PlanResourceChange {
        type_name: String,
        #[serde(default)]
        config: Option<Config>,
        #[serde(default)]
        prior_state: Option<InstanceState>,
    },
    ApplyResourceChange {
        type_name: String,
        #[serde(default)]
        prior_state: Option<InstanceState>,
        planned: Plan,
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Response {
    GetSchema {
        schema: ProviderSchema,
        diagnostics: Diagnostics,
    },
    PrepareProviderConfig {
        diagnostics: Diagnostics,
    },
    ValidateResourceTypeConfig {
        diagnostics: Diagnostics,
    },
    ValidateDataSourceConfig {
        diagnostics: Diagnostics,
    },
    Configure {
        diagnostics: Diagnostics,
    },
    ReadResource {
        new_state: Option<InstanceState>,
        diagnostics: Diagnostics,
    },
    PlanResourceChange {
        planned: Option<Plan>,
        diagnostics: Diagnostics,
    },
    ApplyResourceChange {
        new_state: Option<InstanceState>,
        diagnostics: Diagnostics,
    },
    ImportResourceState {
        imported: Vec<InstanceState>,
        diagnostics: Diagnostics,
    },
    ReadDataSource {
        state: Option<Attributes>,
        diagnostics: Diagnostics,
    },
    UpgradeResourceState {
        upgraded_state: Option<InstanceState>,
        diagnostics: Diagnostics,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedBlock {
    pub type_name: String,
    pub nesting: Nesting,
    pub block: BlockSchema,
    #[serde(default)]
    pub min_items: usize,
    #[serde(default)]
    pub max_items: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSchema {
    pub attributes: Vec<AttributeSchema>,
    #[serde(default)]
    pub block_types: Vec<NestedBlock>,
}

impl BlockSchema {
    pub fn from_block(block: &Block) -> Self {
        Self::from_attributes(&block.attributes)
    }

    fn from_attributes(attributes: &[AttributeDescriptor]) -> Self {
        let mut schema = Self::default();
        for attr in attributes {
            match &attr.ty {
                AttributeType::ListOfRecord(fields) | AttributeType::SetOfRecord(fields) => {
                    let nesting = match attr.ty {
                        AttributeType::SetOfRecord(_) => Nesting::Set,
                        _ => Nesting::List,
                    };
                    let max_items = attr
                        .validators
                        .iter()
                        .find_map(|v| match v {
                            Validator::MaxItems(n) => Some(*n),
                            _ => None,
                        })
                        .unwrap_or(0);
                    schema.block_types.push(NestedBlock {
                        type_name: attr.name.to_string(),
                        nesting,
                        block: Self::from_attributes(fields),
                        min_items: usize::from(attr.is_required()),
                        max_items,
                    });
                }
                _ => schema.attributes.push(AttributeSchema::from_descriptor(attr)),
            }
        }
        schema
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
    pub resource_schemas: BTreeMap<String, TypeSchema>,
    pub data_source_schemas: BTreeMap<String, TypeSchema>,
}

impl ProviderSchema {
    pub fn from_registry(registry: &Registry) -> Self {
        Self {
            provider: BlockSchema::from_block(registry.provider_block()),
            resource_schemas: registry
                .resources()
                .map(|r| {
                    let schema = TypeSchema {
                        version: r.version,
                        description: r.description.to_string(),
                        block: BlockSchema::from_block(&r.block),
                    };
                    (r.type_name.to_string(), schema)
                })
                .collect(),
            data_source_schemas: registry
                .data_sources()
                .map(|d| {
                    let schema = TypeSchema {
                        version: 0,
                        description: d.description.to_string(),
                        block: BlockSchema::from_block(&d.block),
                    };
                    (d.type_name.to_string(), schema)
                })
                .collect(),
        }
    }
}

#[async_trait]
pub trait ProviderServer: Send + Sync {
    fn protocol_version(&self) -> u32;

    async fn call(&self, request: Request, ctx: &CallContext) -> Response;
}

fn diagnostics_of(result: Result<Diagnostics, ProviderError>) -> Diagnostics {
    result.unwrap_or_else(ProviderError::into_diagnostics)
}

/// v5 server over one [`Provider`].
pub struct Server {
    provider: Provider,
}

impl Server {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
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
            Request::PrepareProviderConfig { config } => Response::PrepareProviderConfig {
                diagnostics: provider.registry().provider_block().validate(&config),
            },
            Request::ValidateResourceTypeConfig { type_name, config } => {
                Response::ValidateResourceTypeConfig {
                    diagnostics: diagnostics_of(
                        provider.validate_resource_config(&type_name, &config),
                    ),
                }
            }
            Request::ValidateDataSourceConfig { type_name, config } => {
                Response::ValidateDataSourceConfig {
                    diagnostics: diagnostics_of(
                        provider.validate_data_source_config(&type_name, &config),
                    ),
                }
            }
            Request::Configure { config } => Response::Configure {
                diagnostics: provider.configure(&config).await,
            },
            Request::ReadResource {
                type_name,
                current_state,
            } => match provider.read(&type_name, &current_state, ctx).await {
                Ok((new_state, diagnostics)) => Response::ReadResource {
                    new_state,
                    diagnostics,
                },
                Err(e) => Response::ReadResource {
                    new_state: Some(current_state),
                    diagnostics: e.into_diagnostics(),
                },
            },
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
                    planned: Some(plan),
                },
                Err(e) => Response::PlanResourceChange {
                    planned: None,
                    diagnostics: e.into_diagnostics(),
                },
            },
            Request::ApplyResourceChange {
                type_name,
                prior_state,
                planned,
            } => match provider
                .apply(&type_name, prior_state.as_ref(), &planned, ctx)
                .await
            {
                Ok(outcome) => Response::ApplyResourceChange {
                    new_state: outcome.state,
                    diagnostics: outcome.diagnostics,
                },
                Err(e) => Response::ApplyResourceChange {
                    new_state: prior_state,
                    diagnostics: e.into_diagnostics(),
                },
            },
            Request::ImportResourceState { type_name, id } => {
                match provider.import(&type_name, &id, ctx).await {
                    Ok(state) => Response::ImportResourceState {
                        imported: vec![state],
                        diagnostics: Diagnostics::new(),
                    },
                    Err(e) => Response::ImportResourceState {
                        imported: Vec::new(),
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
                    upgraded_state: Some(state),
                    diagnostics,
                },
                Err(e) => Response::UpgradeResourceState {
                    upgraded_state: None,
                    diagnostics: e.into_diagnostics(),
                },
            },
        }
    }
}
