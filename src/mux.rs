//! Composes several v6 backends into one provider.
//!
//! Each resource and data-source type belongs to exactly one backend.
//! Provider-wide calls (configure and provider validation) reach every
//! backend and their diagnostics are merged.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::diagnostics::Diagnostics;
use crate::error::ProviderError;
use crate::protocol::{
    PROTOCOL_VERSION, ProviderSchema, ProviderServer, Request, Response, ValidateTarget,
    protocol_error,
};
use crate::remote::CallContext;

pub struct MuxServer {
    backends: Vec<Arc<dyn ProviderServer>>,
    resources: BTreeMap<String, usize>,
    data_sources: BTreeMap<String, usize>,
    schema: ProviderSchema,
}

impl MuxServer {
    /// Collect every backend's schema and build the routing table.
    ///
    /// Fails when a backend is not v6, cannot report its schema, disagrees
    /// on the provider block, or claims a type another backend already
    /// serves.
    pub async fn new(backends: Vec<Arc<dyn ProviderServer>>) -> Result<Self, ProviderError> {
        if backends.is_empty() {
            return Err(ProviderError::Protocol("mux needs at least one backend".into()));
        }

        let ctx = CallContext::default();
        let mut resources = BTreeMap::new();
        let mut data_sources = BTreeMap::new();
        let mut merged: Option<ProviderSchema> = None;

        for (index, backend) in backends.iter().enumerate() {
            let version = backend.protocol_version();
            if version != PROTOCOL_VERSION {
                return Err(ProviderError::Protocol(format!(
                    "backend {index} speaks protocol v{version}, expected v{PROTOCOL_VERSION}"
                )));
            }

            let schema = match backend.call(Request::GetSchema, &ctx).await {
                Response::GetSchema {
                    schema,
                    diagnostics,
                } if !diagnostics.has_errors() => schema,
                _ => {
                    return Err(ProviderError::Protocol(format!(
                        "backend {index} did not report its schema"
                    )));
                }
            };

            let target = merged.get_or_insert_with(|| ProviderSchema {
                provider: schema.provider.clone(),
                ..ProviderSchema::default()
            });
            if target.provider != schema.provider {
                return Err(ProviderError::Protocol(format!(
                    "backend {index} declares a different provider configuration schema"
                )));
            }
            for (name, type_schema) in schema.resources {
                if resources.insert(name.clone(), index).is_some() {
                    return Err(ProviderError::Protocol(format!(
                        "resource type {name} is served by more than one backend"
                    )));
                }
                target.resources.insert(name, type_schema);
            }
            for (name, type_schema) in schema.data_sources {
                if data_sources.insert(name.clone(), index).is_some() {
                    return Err(ProviderError::Protocol(format!(
                        "data source {name} is served by more than one backend"
                    )));
                }
                target.data_sources.insert(name, type_schema);
            }
        }

        tracing::info!(
            backends = backends.len(),
            resources = resources.len(),
            data_sources = data_sources.len(),
            "mux ready"
        );
        Ok(Self {
            backends,
            resources,
            data_sources,
            schema: merged.unwrap_or_default(),
        })
    }

    pub fn schema(&self) -> &ProviderSchema {
        &self.schema
    }

    fn route(&self, request: &Request) -> Result<&Arc<dyn ProviderServer>, Diagnostics> {
        let Some(type_name) = request.type_name() else {
            return Err(protocol_error("type_name is required"));
        };
        let (table, what) = if request.targets_data_source() {
            (&self.data_sources, "data source")
        } else {
            (&self.resources, "resource type")
        };
        table
            .get(type_name)
            .map(|&index| &self.backends[index])
            .ok_or_else(|| protocol_error(format!("unknown {what} {type_name}")))
    }

    /// Send `request` to every backend and merge the diagnostics.
    async fn fan_out(&self, request: Request, ctx: &CallContext) -> Response {
        let mut merged = Diagnostics::new();
        for backend in &self.backends {
            let response = backend.call(request.clone(), ctx).await;
            for diagnostic in response.diagnostics().iter() {
                if !merged.iter().any(|d| d == diagnostic) {
                    merged.push(diagnostic.clone());
                }
            }
        }
        let mut response = Response::failure(&request, Diagnostics::new());
        *response.diagnostics_mut() = merged;
        response
    }
}

#[async_trait]
impl ProviderServer for MuxServer {
    fn protocol_version(&self) -> u32 {
        PROTOCOL_VERSION
    }

    async fn call(&self, request: Request, ctx: &CallContext) -> Response {
        match &request {
            Request::GetSchema => Response::GetSchema {
                schema: self.schema.clone(),
                diagnostics: Diagnostics::new(),
            },
            Request::Configure { .. }
            | Request::ValidateConfig {
                target: ValidateTarget::Provider,
                ..
            } => self.fan_out(request, ctx).await,
            _ => match self.route(&request) {
                Ok(backend) => backend.call(request, ctx).await,
                Err(diagnostics) => {
                    tracing::warn!(type_name = ?request.type_name(), "unroutable request");
                    Response::failure(&request, diagnostics)
                }
            },
        }
    }
}
