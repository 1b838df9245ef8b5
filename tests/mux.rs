use std::io::Write;
use std::sync::Arc;

use snowform::backend;
use snowform::mux::MuxServer;
use snowform::plan::{Plan, ResourceAction};
use snowform::protocol::{ProviderServer, Request, Response, ValidateTarget};
use snowform::remote::memory::{MemoryFactory, MemoryRemote};
use snowform::remote::{CallContext, ObjectKind};
use snowform::resources::{account_parameter, data_sources, masking_policy, warehouse};
use snowform::state::InstanceState;
use snowform::value::{Config, Record, Value};
use tempfile::NamedTempFile;

struct Session {
    remote: Arc<MemoryRemote>,
    server: MuxServer,
    // Keeps the credential file alive for the session.
    credentials: NamedTempFile,
}

impl Session {
    async fn new() -> Self {
        let remote = Arc::new(MemoryRemote::new());
        let factory = Arc::new(MemoryFactory::new(remote.clone()));
        let server = backend::provider_server(factory).await.unwrap();

        let mut credentials = NamedTempFile::new().unwrap();
        writeln!(credentials, "[default]\naccount_name = \"SANDBOX\"").unwrap();
        Self {
            remote,
            server,
            credentials,
        }
    }

    fn provider_config(&self) -> Config {
        Config::new().with(
            "config_path",
            self.credentials.path().to_string_lossy().to_string(),
        )
    }

    async fn call(&self, request: Request) -> Response {
        self.server.call(request, &CallContext::default()).await
    }

    async fn configure(&self, config: Config) -> Response {
        self.call(Request::Configure { config }).await
    }

    async fn plan(&self, type_name: &str, config: Config, prior: Option<InstanceState>) -> Plan {
        let response = self
            .call(Request::PlanResourceChange {
                type_name: type_name.to_string(),
                config: Some(config),
                prior_state: prior,
            })
            .await;
        match response {
            Response::PlanResourceChange {
                plan: Some(plan), ..
            } => plan,
            other => panic!("no plan: {other:?}"),
        }
    }

    async fn apply(&self, type_name: &str, config: Config) -> InstanceState {
        let plan = self.plan(type_name, config, None).await;
        let response = self
            .call(Request::ApplyResourceChange {
                type_name: type_name.to_string(),
                prior_state: None,
                plan,
            })
            .await;
        match response {
            Response::ApplyResourceChange {
                new_state: Some(state),
                diagnostics,
                ..
            } if !diagnostics.has_errors() => state,
            other => panic!("apply failed: {other:?}"),
        }
    }
}

fn masking_policy_config() -> Config {
    let mut argument = Record::new();
    argument.insert("name".to_string(), Value::from("VAL"));
    argument.insert("type".to_string(), Value::from("VARCHAR"));
    Config::new()
        .with("database", "DB")
        .with("schema", "PUBLIC")
        .with("name", "MASK")
        .with("argument", vec![Value::Record(argument)])
        .with("body", "'***'")
        .with("return_data_type", "VARCHAR")
}

#[tokio::test]
async fn test_schema_merges_both_backends() {
    let session = Session::new().await;
    let response = session.call(Request::GetSchema).await;
    let Response::GetSchema {
        schema,
        diagnostics,
    } = response
    else {
        panic!("wrong response kind");
    };
    assert!(diagnostics.is_empty());
    assert!(schema.resources.contains_key(warehouse::TYPE_NAME));
    assert!(schema.resources.contains_key(masking_policy::TYPE_NAME));
    assert!(schema.data_sources.contains_key(data_sources::WAREHOUSES));

    // Legacy blocks arrive as nested attributes.
    let argument = schema.resources[masking_policy::TYPE_NAME]
        .block
        .attributes
        .iter()
        .find(|a| a.name == "argument")
        .unwrap();
    assert!(argument.nested.is_some());
}

#[tokio::test]
async fn test_configure_reaches_both_backends() {
    let session = Session::new().await;
    let response = session.configure(session.provider_config()).await;
    assert!(!response.diagnostics().has_errors(), "{response:?}");

    let warehouse = session
        .apply(warehouse::TYPE_NAME, Config::new().with("name", "W1"))
        .await;
    assert_eq!(warehouse.attribute("name"), Some(&Value::from("W1")));

    let policy = session
        .apply(masking_policy::TYPE_NAME, masking_policy_config())
        .await;
    assert_eq!(
        policy.attribute("fully_qualified_name"),
        Some(&Value::from("\"DB\".\"PUBLIC\".\"MASK\""))
    );
    assert_eq!(session.remote.object_count(ObjectKind::MaskingPolicy), 1);
}

#[tokio::test]
async fn test_configure_errors_are_reported_once() {
    let session = Session::new().await;
    let config = session
        .provider_config()
        .with("preview_features_enabled", vec![Value::from("not_a_feature")]);
    let response = session.configure(config).await;

    let errors: Vec<_> = response.diagnostics().errors().collect();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].summary.contains("not_a_feature"));
}

#[tokio::test]
async fn test_legacy_import_round_trips() {
    let session = Session::new().await;
    session.configure(session.provider_config()).await;
    session
        .apply(
            account_parameter::TYPE_NAME,
            Config::new()
                .with("key", "TIMEZONE")
                .with("value", "UTC"),
        )
        .await;

    let response = session
        .call(Request::ImportResourceState {
            type_name: account_parameter::TYPE_NAME.to_string(),
            id: "TIMEZONE".to_string(),
        })
        .await;
    let Response::ImportResourceState {
        state: Some(state),
        diagnostics,
    } = response
    else {
        panic!("nothing imported");
    };
    assert!(!diagnostics.has_errors());
    assert_eq!(state.attribute("value"), Some(&Value::from("UTC")));

    let config = Config::new().with("key", "TIMEZONE").with("value", "UTC");
    let plan = session
        .plan(account_parameter::TYPE_NAME, config, Some(state))
        .await;
    assert_eq!(plan.action, ResourceAction::NoOp);
}

#[tokio::test]
async fn test_data_source_routes_by_data_source_table() {
    let session = Session::new().await;
    session.configure(session.provider_config()).await;
    session
        .apply(warehouse::TYPE_NAME, Config::new().with("name", "W1"))
        .await;

    let response = session
        .call(Request::ReadDataSource {
            type_name: data_sources::WAREHOUSES.to_string(),
            config: Config::new().with("like", "W%"),
        })
        .await;
    let Response::ReadDataSource {
        state: Some(attributes),
        ..
    } = response
    else {
        panic!("data source read failed: {response:?}");
    };
    assert_eq!(attributes["warehouses"].as_list().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_type_is_a_diagnostic() {
    let session = Session::new().await;
    let response = session
        .call(Request::ImportResourceState {
            type_name: "snowflake_stage".to_string(),
            id: "S".to_string(),
        })
        .await;
    assert!(matches!(
        response,
        Response::ImportResourceState { state: None, .. }
    ));
    let error = response.diagnostics().errors().next().unwrap();
    assert!(error.summary.contains("snowflake_stage"));

    let response = session
        .call(Request::ValidateConfig {
            target: ValidateTarget::DataSource,
            type_name: Some(warehouse::TYPE_NAME.to_string()),
            config: Config::new(),
        })
        .await;
    assert!(response.diagnostics().has_errors());
}

#[tokio::test]
async fn test_upgrade_drops_unknown_attributes() {
    let session = Session::new().await;
    session.configure(session.provider_config()).await;
    let state = session
        .apply(warehouse::TYPE_NAME, Config::new().with("name", "W1"))
        .await;

    let mut raw = serde_json::to_value(&state).unwrap();
    raw["attributes"]["max_concurrency"] = serde_json::json!(8);
    let response = session
        .call(Request::UpgradeResourceState {
            type_name: warehouse::TYPE_NAME.to_string(),
            version: 1,
            raw_state: raw,
        })
        .await;
    let Response::UpgradeResourceState {
        state: Some(upgraded),
        diagnostics,
    } = response
    else {
        panic!("upgrade failed");
    };
    assert_eq!(upgraded, state);
    assert!(diagnostics.warnings().any(|w| w.summary.contains("max_concurrency")));
}
