//! Serves a v5 backend over protocol v6.

use async_trait::async_trait;

use super::{
    AttributeSchema, BlockSchema, NestedSchema, ProviderSchema, ProviderServer, Request, Response,
    TypeSchema, ValidateTarget, protocol_error, v5,
};
use crate::diagnostics::Diagnostics;
use crate::remote::CallContext;

pub struct UpgradeServer<S> {
    inner: S,
}

impl<S: v5::ProviderServer> UpgradeServer<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

/// Nested blocks become nested attributes, placed after the scalar ones.
fn upgrade_block(block: v5::BlockSchema) -> BlockSchema {
    let mut attributes = block.attributes;
    for nested in block.block_types {
        let required = nested.min_items > 0;
        let inner = upgrade_block(nested.block);
        attributes.push(AttributeSchema {
            name: nested.type_name,
            ty: String::new(),
            description: String::new(),
            required,
            optional: !required,
            computed: false,
            sensitive: false,
            nested: Some(NestedSchema {
                nesting: nested.nesting,
                attributes: inner.attributes,
                max_items: (nested.max_items > 0).then_some(nested.max_items),
            }),
        });
    }
    BlockSchema { attributes }
}

fn upgrade_type(schema: v5::TypeSchema) -> TypeSchema {
    TypeSchema {
        version: schema.version,
        description: schema.description,
        block: upgrade_block(schema.block),
    }
}

pub fn upgrade_schema(schema: v5::ProviderSchema) -> ProviderSchema {
    ProviderSchema {
        provider: upgrade_block(schema.provider),
        resources: schema
            .resource_schemas
            .into_iter()
            .map(|(name, s)| (name, upgrade_type(s)))
            .collect(),
        data_sources: schema
            .data_source_schemas
            .into_iter()
            .map(|(name, s)| (name, upgrade_type(s)))
            .collect(),
    }
}

/// v5 form of a v6 request, or the diagnostics explaining why there is none.
fn downgrade_request(request: Request) -> Result<v5::Request, Diagnostics> {
    let request = match request {
        Request::GetSchema => v5::Request::GetSchema,
        Request::ValidateConfig {
            target: ValidateTarget::Provider,
            config,
            ..
        } => v5::Request::PrepareProviderConfig { config },
        Request::ValidateConfig {
            target,
            type_name,
            config,
        } => {
            let type_name =
                type_name.ok_or_else(|| protocol_error("type_name is required"))?;
            if target == ValidateTarget::DataSource {
                v5::Request::ValidateDataSourceConfig { type_name, config }
            } else {
                v5::Request::ValidateResourceTypeConfig { type_name, config }
            }
        }
        Request::Configure { config } => v5::Request::Configure { config },
        Request::ReadResource { type_name, state } => v5::Request::ReadResource {
            type_name,
            current_state: state,
        },
        Request::PlanResourceChange {
            type_name,
            config,
            prior_state,
        } => v5::Request::PlanResourceChange {
            type_name,
            config,
            prior_state,
        },
        Request::ApplyResourceChange {
            type_name,
            prior_state,
            plan,
        } => v5::Request::ApplyResourceChange {
            type_name,
            prior_state,
            planned: plan,
        },
        Request::ImportResourceState { type_name, id } => {
            v5::Request::ImportResourceState { type_name, id }
        }
        Request::ReadDataSource { type_name, config } => {
            v5::Request::ReadDataSource { type_name, config }
        }
        Request::UpgradeResourceState {
            type_name,
            version,
            raw_state,
        } => v5::Request::UpgradeResourceState {
            type_name,
            version,
            raw_state,
        },
    };
    Ok(request)
}

fn upgrade_response(response: v5::Response) -> Response {
    match response {
        v5::Response::GetSchema {
            schema,
            diagnostics,
        } => Response::GetSchema {
            schema: upgrade_schema(schema),
            diagnostics,
        },
        v5::Response::PrepareProviderConfig { diagnostics }
        | v5::Response::ValidateResourceTypeConfig { diagnostics }
        | v5::Response::ValidateDataSourceConfig { diagnostics } => {
            Response::ValidateConfig { diagnostics }
        }
        v5::Response::Configure { diagnostics } => Response::Configure { diagnostics },
        v5::Response::ReadResource {
            new_state,
            diagnostics,
        } => Response::ReadResource {
            state: new_state,
            diagnostics,
        },
        v5::Response::PlanResourceChange {
            planned,
            diagnostics,
        } => Response::PlanResourceChange {
            plan: planned,
            diagnostics,
        },
        v5::Response::ApplyResourceChange {
            new_state,
            diagnostics,
        } => Response::ApplyResourceChange {
            new_state,
            completed: Vec::new(),
            diagnostics,
        },
        v5::Response::ImportResourceState {
            imported,
            diagnostics,
        } => Response::ImportResourceState {
            state: imported.into_iter().next(),
            diagnostics,
        },
        v5::Response::ReadDataSource { state, diagnostics } => {
            Response::ReadDataSource { state, diagnostics }
        }
        v5::Response::UpgradeResourceState {
            upgraded_state,
            diagnostics,
        } => Response::UpgradeResourceState {
            state: upgraded_state,
            diagnostics,
        },
    }
}

#[async_trait]
impl<S: v5::ProviderServer> ProviderServer for UpgradeServer<S> {
    fn protocol_version(&self) -> u32 {
        super::PROTOCOL_VERSION
    }

    async fn call(&self, request: Request, ctx: &CallContext) -> Response {
        let fallback = request.clone();
        match downgrade_request(request) {
            Ok(request) => upgrade_response(self.inner.call(request, ctx).await),
            Err(diagnostics) => Response::failure(&fallback, diagnostics),
        }
    }
}
