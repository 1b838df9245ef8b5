//! One provider backend: a registry of types plus the configured session.
//!
//! Every lifecycle operation goes through here. The protocol servers only
//! translate wire messages into these calls.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::ProviderConfig;
use crate::diagnostics::{AttributePath, Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::executor::{ApplyOutcome, Executor};
use crate::import;
use crate::plan::Plan;
use crate::reconciler;
use crate::remote::{CallContext, ClientFactory, Limit, RemoteClient, ShowFilter};
use crate::schema::{DataSourceSchema, Registry};
use crate::snapshot;
use crate::state::InstanceState;
use crate::value::{Attributes, Config, Value};

struct Session {
    config: ProviderConfig,
    client: Arc<dyn RemoteClient>,
}

pub struct Provider {
    registry: Registry,
    factory: Arc<dyn ClientFactory>,
    session: RwLock<Option<Session>>,
}

impl Provider {
    pub fn new(registry: Registry, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            registry,
            factory,
            session: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn is_configured(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Validate, resolve and connect. Repeating Configure with the same
    /// resolved configuration keeps the existing client.
    pub async fn configure(&self, config: &Config) -> Diagnostics {
        let diagnostics = self.registry.provider_block().validate(config);
        if diagnostics.has_errors() {
            return diagnostics;
        }
        match ProviderConfig::resolve(config) {
            Ok(resolved) => self.configure_resolved(resolved).await,
            Err(e) => e.into_diagnostics(),
        }
    }

    pub async fn configure_resolved(&self, resolved: ProviderConfig) -> Diagnostics {
        let mut session = self.session.write().await;
        if session.as_ref().is_some_and(|s| s.config == resolved) {
            tracing::debug!("provider configuration unchanged");
            return Diagnostics::new();
        }
        match self.factory.connect(&resolved).await {
            Ok(client) => {
                *session = Some(Session {
                    config: resolved,
                    client,
                });
                Diagnostics::new()
            }
            Err(e) => e.into_diagnostics(),
        }
    }

    async fn client_for(
        &self,
        type_name: &str,
        preview: Option<&str>,
    ) -> Result<Arc<dyn RemoteClient>, ProviderError> {
        let session = self.session.read().await;
        let session = session.as_ref().ok_or_else(|| {
            ProviderError::Protocol("provider must be configured before use".to_string())
        })?;
        if let Some(feature) = preview
            && !session.config.is_preview_enabled(feature)
        {
            return Err(ProviderError::Validation(
                Diagnostic::error(format!("{type_name} is a preview feature"))
                    .with_detail(format!(
                        "add \"{feature}\" to preview_features_enabled in the provider configuration"
                    ))
                    .into(),
            ));
        }
        Ok(session.client.clone())
    }

    pub fn validate_resource_config(
        &self,
        type_name: &str,
        config: &Config,
    ) -> Result<Diagnostics, ProviderError> {
        Ok(self.registry.resource(type_name)?.block.validate(config))
    }

    pub fn validate_data_source_config(
        &self,
        type_name: &str,
        config: &Config,
    ) -> Result<Diagnostics, ProviderError> {
        Ok(self.registry.data_source(type_name)?.block.validate(config))
    }

    /// Plan one instance. The remote is read only when there is prior state
    /// to compare against.
    pub async fn plan(
        &self,
        type_name: &str,
        config: Option<&Config>,
        prior: Option<&InstanceState>,
        ctx: &CallContext,
    ) -> Result<Plan, ProviderError> {
        let schema = self.registry.resource(type_name)?;
        if let Some(config) = config {
            let diagnostics = schema.block.validate(config);
            if diagnostics.has_errors() {
                return Err(ProviderError::Validation(diagnostics));
            }
        }
        let client = self.client_for(type_name, schema.preview_feature).await?;
        let remote = match prior {
            Some(prior) => snapshot::read(client.as_ref(), ctx, schema, &prior.identifier).await?,
            None => None,
        };
        reconciler::plan(schema, config, prior, remote.as_ref())
    }

    pub async fn apply(
        &self,
        type_name: &str,
        prior: Option<&InstanceState>,
        plan: &Plan,
        ctx: &CallContext,
    ) -> Result<ApplyOutcome, ProviderError> {
        let schema = self.registry.resource(type_name)?;
        let client = self.client_for(type_name, schema.preview_feature).await?;
        Ok(Executor::new(schema, client.as_ref(), ctx)
            .apply(prior, plan)
            .await)
    }

    pub async fn import(
        &self,
        type_name: &str,
        id: &str,
        ctx: &CallContext,
    ) -> Result<InstanceState, ProviderError> {
        let schema = self.registry.resource(type_name)?;
        let client = self.client_for(type_name, schema.preview_feature).await?;
        import::import(client.as_ref(), ctx, schema, id).await
    }

    /// Refresh `prior` from the remote; `None` when the object is gone.
    pub async fn read(
        &self,
        type_name: &str,
        prior: &InstanceState,
        ctx: &CallContext,
    ) -> Result<(Option<InstanceState>, Diagnostics), ProviderError> {
        let schema = self.registry.resource(type_name)?;
        let client = self.client_for(type_name, schema.preview_feature).await?;
        match snapshot::read(client.as_ref(), ctx, schema, &prior.identifier).await? {
            Some(remote) => {
                let (state, diagnostics) = reconciler::refresh(schema, prior, &remote);
                Ok((Some(state), diagnostics))
            }
            None => {
                let diagnostics = Diagnostic::warning(format!(
                    "{} {} was removed outside of this configuration",
                    schema.kind, prior.identifier
                ))
                .into();
                Ok((None, diagnostics))
            }
        }
    }

    /// Run a data source: the configured arguments plus the output list.
    pub async fn read_data_source(
        &self,
        type_name: &str,
        config: &Config,
        ctx: &CallContext,
    ) -> Result<Attributes, ProviderError> {
        let schema = self.registry.data_source(type_name)?;
        let diagnostics = schema.block.validate(config);
        if diagnostics.has_errors() {
            return Err(ProviderError::Validation(diagnostics));
        }
        let client = self.client_for(type_name, schema.preview_feature).await?;

        let filter = show_filter(schema, config);
        let kind = schema.kind;
        let objects = ctx.read("show", || client.show(kind, &filter)).await?;

        let rows: Vec<Value> = objects
            .into_iter()
            .map(|object| {
                let mut row = object.properties;
                row.insert("name".to_string(), Value::from(object.identifier.name()));
                Value::Record(row)
            })
            .collect();
        tracing::debug!(data_source = type_name, rows = rows.len(), "data source read");

        let mut attributes: Attributes = config
            .iter()
            .filter_map(|(name, value)| value.as_set().map(|v| (name.to_string(), v.clone())))
            .collect();
        attributes.insert(schema.output.to_string(), Value::List(rows));
        Ok(attributes)
    }

    /// Decode a stored state written by `version` of the schema.
    ///
    /// Only the current version is understood. Attributes the schema no
    /// longer declares are dropped with a warning.
    pub fn upgrade_state(
        &self,
        type_name: &str,
        version: u64,
        raw: &serde_json::Value,
    ) -> Result<(InstanceState, Diagnostics), ProviderError> {
        let schema = self.registry.resource(type_name)?;
        if version != schema.version {
            return Err(ProviderError::Protocol(format!(
                "{type_name} has no upgrade path from schema version {version} to {}",
                schema.version
            )));
        }
        let mut state: InstanceState = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::Protocol(format!("invalid {type_name} state: {e}")))?;

        let mut diagnostics = Diagnostics::new();
        state.attributes.retain(|name, _| {
            let known = schema.attribute(name).is_some();
            if !known {
                diagnostics.push(
                    Diagnostic::warning(format!("dropping unknown attribute \"{name}\""))
                        .at(AttributePath::root(name)),
                );
            }
            known
        });
        state.schema_version = schema.version;
        Ok((state, diagnostics))
    }
}

fn show_filter(schema: &DataSourceSchema, config: &Config) -> ShowFilter {
    let text = |name: &str| {
        if schema.block.attribute(name).is_some() {
            config.get_str(name).map(str::to_string)
        } else {
            None
        }
    };
    let limit = config
        .get("limit")
        .as_set()
        .and_then(Value::as_list)
        .and_then(|items| items.first())
        .and_then(Value::as_record)
        .and_then(|record| {
            let rows = record.get("rows").and_then(Value::as_int)?;
            Some(Limit {
                rows: u64::try_from(rows).ok()?,
                from: record.get("from").and_then(Value::as_str).map(str::to_string),
            })
        });
    ShowFilter {
        like: text("like"),
        starts_with: text("starts_with"),
        limit,
        ..ShowFilter::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{MemoryFactory, MemoryRemote};
    use crate::resources::{compute_pool, data_sources, framework_registry, warehouse};

    fn provider() -> (Provider, MemoryFactory) {
        let factory = MemoryFactory::new(Arc::new(MemoryRemote::new()));
        let provider = Provider::new(framework_registry(), Arc::new(factory.clone()));
        (provider, factory)
    }

    fn resolved(features: &[&str]) -> ProviderConfig {
        ProviderConfig {
            account_name: Some("acct".to_string()),
            preview_features_enabled: features.iter().map(|f| f.to_string()).collect(),
            ..ProviderConfig::default()
        }
    }

    #[tokio::test]
    async fn test_configure_is_idempotent() {
        let (provider, factory) = provider();
        assert!(provider.configure_resolved(resolved(&[])).await.is_empty());
        assert!(provider.configure_resolved(resolved(&[])).await.is_empty());
        assert_eq!(factory.connections(), 1);

        provider
            .configure_resolved(resolved(&[compute_pool::PREVIEW_FEATURE]))
            .await;
        assert_eq!(factory.connections(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_refuses_work() {
        let (provider, _) = provider();
        let config = Config::new().with("name", "W1");
        let err = provider
            .plan(warehouse::TYPE_NAME, Some(&config), None, &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_preview_types_are_gated() {
        let (provider, _) = provider();
        provider.configure_resolved(resolved(&[])).await;
        let config = Config::new()
            .with("name", "P1")
            .with("instance_family", "CPU_X64_XS")
            .with("min_nodes", 1)
            .with("max_nodes", 1);
        let err = provider
            .plan(compute_pool::TYPE_NAME, Some(&config), None, &CallContext::default())
            .await
            .unwrap_err();
        let diags = err.into_diagnostics();
        let detail = diags.iter().next().unwrap().detail.clone().unwrap();
        assert!(detail.contains(compute_pool::PREVIEW_FEATURE));

        let err = provider
            .read_data_source(data_sources::COMPUTE_POOLS, &Config::new(), &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_upgrade_state_drops_unknown_attributes() {
        let (provider, _) = provider();
        let raw = serde_json::json!({
            "schema_version": 1,
            "identifier": {"kind": "account", "name": "W1"},
            "attributes": {"name": "W1", "max_concurrency": 4}
        });
        let (state, diags) = provider
            .upgrade_state(warehouse::TYPE_NAME, 1, &raw)
            .unwrap();
        assert!(state.attribute("max_concurrency").is_none());
        assert_eq!(diags.warnings().count(), 1);

        assert!(provider.upgrade_state(warehouse::TYPE_NAME, 0, &raw).is_err());
    }

    #[test]
    fn test_show_filter_from_data_source_config() {
        let mut limit = crate::value::Record::new();
        limit.insert("rows".to_string(), Value::Int(2));
        limit.insert("from".to_string(), Value::from("P"));
        let config = Config::new()
            .with("like", "P-%")
            .with("limit", Value::List(vec![Value::Record(limit)]));
        let filter = show_filter(&data_sources::compute_pools(), &config);
        assert_eq!(filter.like.as_deref(), Some("P-%"));
        assert_eq!(filter.limit.unwrap().rows, 2);
        assert!(filter.starts_with.is_none());
    }
}
