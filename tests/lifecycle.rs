use std::sync::Arc;
use std::time::Duration;

use snowform::config::ProviderConfig;
use snowform::error::ProviderError;
use snowform::executor::{ApplyOutcome, Step};
use snowform::identifier::Identifier;
use snowform::plan::{FieldAction, Plan, ResourceAction};
use snowform::provider::Provider;
use snowform::remote::memory::{MemoryFactory, MemoryRemote, Operation};
use snowform::remote::{
    Alteration, CallContext, CallPolicy, CreateRequest, ObjectKind, ParameterLevel, RemoteClient,
    RemoteError,
};
use snowform::resources::{
    account_parameter, data_sources, full_registry, masking_policy, warehouse,
};
use snowform::state::{InstanceState, MemoryStateStore, StateStore};
use snowform::value::{Config, Record, Value};
use tokio_util::sync::CancellationToken;

const WAREHOUSE: &str = warehouse::TYPE_NAME;

/// Provider over an in-memory account, with a host-side state store.
struct Host {
    remote: Arc<MemoryRemote>,
    provider: Provider,
    store: MemoryStateStore,
    ctx: CallContext,
}

impl Host {
    async fn new() -> Self {
        Self::with_features(&[]).await
    }

    async fn with_features(features: &[&str]) -> Self {
        let remote = Arc::new(MemoryRemote::new());
        let factory = Arc::new(MemoryFactory::new(remote.clone()));
        let provider = Provider::new(full_registry(), factory);
        let diagnostics = provider
            .configure_resolved(ProviderConfig {
                preview_features_enabled: features.iter().map(|f| f.to_string()).collect(),
                ..ProviderConfig::default()
            })
            .await;
        assert!(!diagnostics.has_errors(), "{diagnostics:?}");
        assert!(provider.is_configured().await);

        let policy = CallPolicy {
            backoff: Duration::from_millis(1),
            ..CallPolicy::default()
        };
        Self {
            remote,
            provider,
            store: MemoryStateStore::new(),
            ctx: CallContext::default().with_policy(policy),
        }
    }

    fn state(&self, type_name: &str, id: &Identifier) -> Option<InstanceState> {
        self.store.get(type_name, id)
    }

    async fn plan(&self, type_name: &str, config: Option<&Config>, id: &Identifier) -> Plan {
        let prior = self.state(type_name, id);
        self.provider
            .plan(type_name, config, prior.as_ref(), &self.ctx)
            .await
            .unwrap()
    }

    /// Plan, apply and commit the outcome the way a host does.
    async fn apply(
        &self,
        type_name: &str,
        config: Option<&Config>,
        id: &Identifier,
    ) -> (Plan, ApplyOutcome) {
        let prior = self.state(type_name, id);
        let plan = self
            .provider
            .plan(type_name, config, prior.as_ref(), &self.ctx)
            .await
            .unwrap();
        let outcome = self
            .provider
            .apply(type_name, prior.as_ref(), &plan, &self.ctx)
            .await
            .unwrap();
        self.store.commit(
            type_name,
            prior.as_ref().map(|p| &p.identifier),
            outcome.state.clone(),
        );
        (plan, outcome)
    }

    fn warehouse(&self, name: &str) -> Record {
        self.remote
            .object(ObjectKind::Warehouse, &Identifier::account(name))
            .unwrap()
    }
}

async fn pool_count(host: &Host, config: Config) -> usize {
    let attributes = host
        .provider
        .read_data_source(data_sources::COMPUTE_POOLS, &config, &host.ctx)
        .await
        .unwrap();
    attributes["compute_pools"].as_list().unwrap().len()
}

fn w1() -> Identifier {
    Identifier::account("W1")
}

fn named(name: &str) -> Config {
    Config::new().with("name", name)
}

#[tokio::test]
async fn test_create_adopts_remote_defaults_then_converges() {
    let host = Host::new().await;
    let config = named("W1");

    let (plan, outcome) = host.apply(WAREHOUSE, Some(&config), &w1()).await;
    assert_eq!(plan.action, ResourceAction::Create);
    assert!(plan.entry("warehouse_size").unwrap().defer_to_remote);
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);
    assert_eq!(
        outcome.completed,
        vec![Step::Create { identifier: w1() }]
    );

    let state = host.state(WAREHOUSE, &w1()).unwrap();
    assert_eq!(state.attribute("warehouse_type"), Some(&Value::from("STANDARD")));
    assert_eq!(state.attribute("warehouse_size"), Some(&Value::from("XSMALL")));
    assert_eq!(state.attribute("auto_suspend"), Some(&Value::Int(600)));
    assert_eq!(
        state.attribute("fully_qualified_name"),
        Some(&Value::from("\"W1\""))
    );

    let second = host.plan(WAREHOUSE, Some(&config), &w1()).await;
    assert!(second.is_empty(), "{:?}", second.changes().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_setting_then_removing_size_restores_default() {
    let host = Host::new().await;
    host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;

    let sized = named("W1").with("warehouse_size", "SMALL");
    let (plan, outcome) = host.apply(WAREHOUSE, Some(&sized), &w1()).await;
    let entry = plan.entry("warehouse_size").unwrap();
    assert_eq!(plan.action, ResourceAction::Update);
    assert_eq!(entry.action, FieldAction::Update);
    assert_eq!(entry.before, Some(Value::from("XSMALL")));
    assert_eq!(entry.after, Some(Value::from("SMALL")));
    assert!(outcome.is_success());
    assert_eq!(host.warehouse("W1")["warehouse_size"], Value::from("SMALL"));

    let (plan, outcome) = host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;
    let entry = plan.entry("warehouse_size").unwrap();
    assert_eq!(entry.action, FieldAction::Update);
    assert_eq!(entry.before, Some(Value::from("SMALL")));
    assert_eq!(entry.after, None);
    assert!(entry.defer_to_remote);
    assert!(outcome.is_success());
    assert_eq!(
        outcome.completed,
        vec![Step::Unset {
            keys: vec!["warehouse_size".to_string()]
        }]
    );
    assert_eq!(host.warehouse("W1")["warehouse_size"], Value::from("XSMALL"));

    assert!(host.plan(WAREHOUSE, Some(&named("W1")), &w1()).await.is_empty());
}

#[tokio::test]
async fn test_removed_parameter_falls_back_to_account_value() {
    let host = Host::new().await;
    let with_timeout = named("W1").with("statement_timeout_in_seconds", 43_200);
    host.apply(WAREHOUSE, Some(&with_timeout), &w1()).await;

    let state = host.state(WAREHOUSE, &w1()).unwrap();
    let timeout = state.parameter("STATEMENT_TIMEOUT_IN_SECONDS").unwrap();
    assert_eq!(timeout.level, ParameterLevel::Object);

    let account = Config::new()
        .with("key", "STATEMENT_TIMEOUT_IN_SECONDS")
        .with("value", "86400");
    let key = Identifier::account("STATEMENT_TIMEOUT_IN_SECONDS");
    let (_, outcome) = host
        .apply(account_parameter::TYPE_NAME, Some(&account), &key)
        .await;
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);

    let (plan, outcome) = host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;
    let entry = plan.entry("statement_timeout_in_seconds").unwrap();
    assert_eq!(entry.action, FieldAction::Update);
    assert_eq!(entry.before, Some(Value::Int(43_200)));
    assert_eq!(entry.after, None);
    assert_eq!(entry.level, Some(ParameterLevel::Object));
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);

    let state = host.state(WAREHOUSE, &w1()).unwrap();
    let timeout = state.parameter("STATEMENT_TIMEOUT_IN_SECONDS").unwrap();
    assert_eq!(timeout.value, Value::Int(86_400));
    assert_eq!(timeout.level, ParameterLevel::Account);
    assert_eq!(
        state.attribute("statement_timeout_in_seconds"),
        Some(&Value::Int(86_400))
    );

    assert!(host.plan(WAREHOUSE, Some(&named("W1")), &w1()).await.is_empty());
}

#[tokio::test]
async fn test_external_change_is_reported_as_drift() {
    let host = Host::new().await;
    let sized = named("W1").with("warehouse_size", "SMALL");
    host.apply(WAREHOUSE, Some(&sized), &w1()).await;

    let mut changed = Record::new();
    changed.insert("warehouse_size".to_string(), Value::from("MEDIUM"));
    host.remote
        .alter(
            ObjectKind::Warehouse,
            &w1(),
            &Alteration {
                set: changed,
                unset: Vec::new(),
            },
        )
        .await
        .unwrap();

    let plan = host.plan(WAREHOUSE, Some(&sized), &w1()).await;
    let entry = plan.entry("warehouse_size").unwrap();
    let drift = entry.drift.as_ref().unwrap();
    assert_eq!(drift.recorded, Some(Value::from("SMALL")));
    assert_eq!(drift.observed, Some(Value::from("MEDIUM")));
    assert_eq!(entry.action, FieldAction::Update);
    assert_eq!(entry.before, Some(Value::from("MEDIUM")));
    assert_eq!(entry.after, Some(Value::from("SMALL")));
}

#[tokio::test]
async fn test_absent_attribute_follows_remote_change() {
    let host = Host::new().await;
    host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;

    let mut changed = Record::new();
    changed.insert("auto_suspend".to_string(), Value::Int(120));
    host.remote
        .alter(
            ObjectKind::Warehouse,
            &w1(),
            &Alteration {
                set: changed,
                unset: Vec::new(),
            },
        )
        .await
        .unwrap();

    let plan = host.plan(WAREHOUSE, Some(&named("W1")), &w1()).await;
    assert!(plan.is_empty());
    assert_eq!(plan.planned.get("auto_suspend"), Some(&Value::Int(120)));
    let warning = plan.diagnostics.warnings().next().unwrap();
    assert!(warning.summary.contains("auto_suspend"));
}

#[tokio::test]
async fn test_compute_pool_data_source_filters() {
    let host = Host::with_features(&[data_sources::COMPUTE_POOLS_PREVIEW_FEATURE]).await;
    for name in ["P-foo", "P-bar", "X-baz"] {
        let mut request = CreateRequest::default();
        request
            .properties
            .insert("instance_family".to_string(), Value::from("CPU_X64_XS"));
        request.properties.insert("min_nodes".to_string(), Value::Int(1));
        request.properties.insert("max_nodes".to_string(), Value::Int(1));
        host.remote
            .create(ObjectKind::ComputePool, &Identifier::account(name), &request)
            .await
            .unwrap();
    }

    assert_eq!(pool_count(&host, Config::new().with("starts_with", "P")).await, 2);
    assert_eq!(pool_count(&host, Config::new().with("like", "P-foo")).await, 1);

    let mut limit = Record::new();
    limit.insert("rows".to_string(), Value::Int(1));
    limit.insert("from".to_string(), Value::from("P"));
    let limited = Config::new().with("limit", vec![Value::Record(limit)]);
    assert_eq!(pool_count(&host, limited).await, 1);
}

#[tokio::test]
async fn test_preview_data_source_requires_opt_in() {
    let host = Host::new().await;
    let err = host
        .provider
        .read_data_source(data_sources::COMPUTE_POOLS, &Config::new(), &host.ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Validation(_)));
    assert!(host.remote.statements().is_empty());
}

#[tokio::test]
async fn test_import_then_plan_is_empty() {
    let host = Host::new().await;
    host.remote
        .create(
            ObjectKind::Warehouse,
            &w1(),
            &CreateRequest::default(),
        )
        .await
        .unwrap();

    let imported = host
        .provider
        .import(WAREHOUSE, "W1", &host.ctx)
        .await
        .unwrap();
    assert_eq!(imported.attribute("name"), Some(&Value::from("W1")));
    assert_eq!(imported.attribute("warehouse_type"), Some(&Value::from("STANDARD")));
    assert_eq!(imported.attribute("warehouse_size"), Some(&Value::from("XSMALL")));
    host.store.commit(WAREHOUSE, None, Some(imported));

    let plan = host.plan(WAREHOUSE, Some(&named("W1")), &w1()).await;
    assert!(plan.is_empty());

    let plan = host.plan(WAREHOUSE, None, &w1()).await;
    assert_eq!(plan.action, ResourceAction::Destroy);
}

#[tokio::test]
async fn test_destroy_removes_object_and_state() {
    let host = Host::new().await;
    host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;

    let (plan, outcome) = host.apply(WAREHOUSE, None, &w1()).await;
    assert_eq!(plan.action, ResourceAction::Destroy);
    assert!(outcome.is_success());
    assert!(outcome.state.is_none());
    assert_eq!(host.remote.object_count(ObjectKind::Warehouse), 0);
    assert!(host.store.is_empty());
}

#[tokio::test]
async fn test_zero_is_distinct_from_absent_and_default() {
    let host = Host::new().await;
    let absent = host.plan(WAREHOUSE, Some(&named("W1")), &w1()).await;
    let zero = host
        .plan(WAREHOUSE, Some(&named("W1").with("auto_suspend", 0)), &w1())
        .await;
    let default = host
        .plan(WAREHOUSE, Some(&named("W1").with("auto_suspend", 600)), &w1())
        .await;

    let entry = |plan: &Plan| plan.entry("auto_suspend").unwrap().clone();
    assert!(entry(&absent).defer_to_remote);
    assert_eq!(entry(&absent).after, None);
    assert_eq!(entry(&zero).after, Some(Value::Int(0)));
    assert_eq!(entry(&default).after, Some(Value::Int(600)));
    assert_ne!(entry(&zero), entry(&default));

    let config = named("W1").with("auto_suspend", 0);
    let (_, outcome) = host.apply(WAREHOUSE, Some(&config), &w1()).await;
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);
    assert_eq!(host.warehouse("W1")["auto_suspend"], Value::Int(0));
    assert!(host.plan(WAREHOUSE, Some(&config), &w1()).await.is_empty());
}

#[tokio::test]
async fn test_enum_case_change_is_not_a_change() {
    let host = Host::new().await;
    let upper = named("W1").with("warehouse_type", "STANDARD");
    host.apply(WAREHOUSE, Some(&upper), &w1()).await;

    let lower = named("W1").with("warehouse_type", "standard");
    let (plan, outcome) = host.apply(WAREHOUSE, Some(&lower), &w1()).await;
    assert!(plan.is_empty());
    assert!(outcome.is_success());

    let state = host.state(WAREHOUSE, &w1()).unwrap();
    assert_eq!(state.attribute("warehouse_type"), Some(&Value::from("standard")));
}

#[tokio::test]
async fn test_rename_runs_first_and_moves_state_key() {
    let host = Host::new().await;
    host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;

    let renamed = named("W2").with("comment", "moved");
    let prior = host.state(WAREHOUSE, &w1());
    let plan = host
        .provider
        .plan(WAREHOUSE, Some(&renamed), prior.as_ref(), &host.ctx)
        .await
        .unwrap();
    assert_eq!(plan.action, ResourceAction::Update);
    assert!(plan.entries[0].rename);
    assert_eq!(plan.changes().filter(|e| e.rename).count(), 1);

    let outcome = host
        .provider
        .apply(WAREHOUSE, prior.as_ref(), &plan, &host.ctx)
        .await
        .unwrap();
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);
    assert!(matches!(outcome.completed[0], Step::Rename { .. }));
    host.store.commit(
        WAREHOUSE,
        prior.as_ref().map(|p| &p.identifier),
        outcome.state.clone(),
    );

    let w2 = Identifier::account("W2");
    assert!(host.state(WAREHOUSE, &w1()).is_none());
    let state = host.state(WAREHOUSE, &w2).unwrap();
    assert_eq!(state.attribute("comment"), Some(&Value::from("moved")));
    assert!(host.remote.object(ObjectKind::Warehouse, &w1()).is_none());
}

#[tokio::test]
async fn test_failed_rename_keeps_state_key() {
    let host = Host::new().await;
    host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;
    host.remote.fail_next(
        Operation::Rename,
        RemoteError::Conflict {
            message: "Object 'W2' already exists.".to_string(),
        },
    );

    let (_, outcome) = host.apply(WAREHOUSE, Some(&named("W2")), &w1()).await;
    assert!(!outcome.is_success());
    assert!(outcome.completed.is_empty());
    let error = outcome.diagnostics.errors().next().unwrap();
    assert!(error.summary.contains("already exists"));

    assert!(host.state(WAREHOUSE, &w1()).is_some());
    assert!(host.state(WAREHOUSE, &Identifier::account("W2")).is_none());
}

#[tokio::test]
async fn test_failure_after_rename_keeps_the_new_key() {
    let host = Host::new().await;
    host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;
    host.remote.fail_next(
        Operation::Alter,
        RemoteError::Conflict {
            message: "size change rejected".to_string(),
        },
    );

    let config = named("W2").with("warehouse_size", "SMALL");
    let (_, outcome) = host.apply(WAREHOUSE, Some(&config), &w1()).await;
    assert!(!outcome.is_success());
    assert_eq!(outcome.completed.len(), 1);
    assert!(outcome.diagnostics.warnings().any(|w| w.summary.contains("1 completed")));

    let w2 = Identifier::account("W2");
    let state = host.state(WAREHOUSE, &w2).unwrap();
    assert_eq!(state.attribute("name"), Some(&Value::from("W2")));
    assert_eq!(state.attribute("warehouse_size"), Some(&Value::from("XSMALL")));

    // The retry only has the size left to do.
    let plan = host.plan(WAREHOUSE, Some(&config), &w2).await;
    assert!(plan.rename().is_none());
    assert_eq!(plan.changes().count(), 1);
}

#[tokio::test]
async fn test_conflicting_create_leaves_nothing_behind() {
    let host = Host::new().await;
    let config = named("W1")
        .with("warehouse_type", "STANDARD")
        .with("resource_constraint", "MEMORY_16X");

    let (_, outcome) = host.apply(WAREHOUSE, Some(&config), &w1()).await;
    assert!(!outcome.is_success());
    assert!(outcome.state.is_none());
    assert_eq!(host.remote.object_count(ObjectKind::Warehouse), 0);
    assert!(host.store.is_empty());
}

#[tokio::test]
async fn test_cancelled_apply_starts_nothing() {
    let host = Host::new().await;
    let plan = host.plan(WAREHOUSE, Some(&named("W1")), &w1()).await;
    host.remote.clear_statements();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = CallContext::new(cancel);
    let outcome = host
        .provider
        .apply(WAREHOUSE, None, &plan, &ctx)
        .await
        .unwrap();
    assert!(!outcome.is_success());
    assert!(outcome.state.is_none());
    assert!(host.remote.statements().is_empty());
}

#[tokio::test]
async fn test_cancelled_plan_aborts() {
    let host = Host::new().await;
    host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;
    let prior = host.state(WAREHOUSE, &w1());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = host
        .provider
        .plan(WAREHOUSE, Some(&named("W1")), prior.as_ref(), &CallContext::new(cancel))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Cancelled));
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_read() {
    let host = Host::new().await;
    host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;
    let prior = host.state(WAREHOUSE, &w1());
    host.remote.set_latency(Duration::from_secs(30));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let ctx = CallContext::new(cancel);
    let err = host
        .provider
        .plan(WAREHOUSE, Some(&named("W1")), prior.as_ref(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Cancelled));
}

#[tokio::test]
async fn test_transient_read_is_retried() {
    let host = Host::new().await;
    host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;
    host.remote.fail_next(
        Operation::Show,
        RemoteError::Transient {
            message: "service busy".to_string(),
        },
    );

    let plan = host.plan(WAREHOUSE, Some(&named("W1")), &w1()).await;
    assert!(plan.is_empty());
}

#[tokio::test]
async fn test_parameter_level_is_part_of_the_value() {
    let host = Host::new().await;
    let account = Config::new()
        .with("key", "STATEMENT_TIMEOUT_IN_SECONDS")
        .with("value", "86400");
    host.apply(
        account_parameter::TYPE_NAME,
        Some(&account),
        &Identifier::account("STATEMENT_TIMEOUT_IN_SECONDS"),
    )
    .await;
    host.apply(WAREHOUSE, Some(&named("W1")), &w1()).await;

    // Same value, but pinned on the object.
    let pinned = named("W1").with("statement_timeout_in_seconds", 86_400);
    let (plan, outcome) = host.apply(WAREHOUSE, Some(&pinned), &w1()).await;
    let entry = plan.entry("statement_timeout_in_seconds").unwrap();
    assert_eq!(entry.action, FieldAction::Update);
    assert_eq!(entry.level, Some(ParameterLevel::Account));
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);

    let plan = host.plan(WAREHOUSE, Some(&named("W1")), &w1()).await;
    assert!(plan.is_empty());
}

#[tokio::test]
async fn test_structural_change_replaces_policy() {
    let host = Host::new().await;
    let id = Identifier::schema("DB", "PUBLIC", "MASK");
    let mut argument = Record::new();
    argument.insert("name".to_string(), Value::from("VAL"));
    argument.insert("type".to_string(), Value::from("varchar"));
    let config = Config::new()
        .with("database", "DB")
        .with("schema", "PUBLIC")
        .with("name", "MASK")
        .with("argument", vec![Value::Record(argument)])
        .with("body", "CASE WHEN CURRENT_ROLE() = 'ADMIN' THEN VAL ELSE '***' END")
        .with("return_data_type", "VARCHAR");

    let (_, outcome) = host
        .apply(masking_policy::TYPE_NAME, Some(&config), &id)
        .await;
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);
    assert!(host
        .plan(masking_policy::TYPE_NAME, Some(&config), &id)
        .await
        .is_empty());

    let body_only = config.clone().with("body", "VAL");
    let plan = host
        .plan(masking_policy::TYPE_NAME, Some(&body_only), &id)
        .await;
    assert_eq!(plan.action, ResourceAction::Update);

    let retyped = config.with("return_data_type", "NUMBER");
    let (plan, outcome) = host
        .apply(masking_policy::TYPE_NAME, Some(&retyped), &id)
        .await;
    assert_eq!(plan.action, ResourceAction::Replace);
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);
    assert_eq!(
        outcome.completed,
        vec![
            Step::Drop {
                identifier: id.clone()
            },
            Step::Create {
                identifier: id.clone()
            },
        ]
    );
}

fn policy_config(argument_name: &str) -> Config {
    let mut argument = Record::new();
    argument.insert("name".to_string(), Value::from(argument_name));
    argument.insert("type".to_string(), Value::from("varchar"));
    Config::new()
        .with("database", "DB")
        .with("schema", "PUBLIC")
        .with("name", "MASK")
        .with("argument", vec![Value::Record(argument)])
        .with("body", format!("CASE WHEN CURRENT_ROLE() = 'ADMIN' THEN {argument_name} ELSE '***' END"))
        .with("return_data_type", "VARCHAR")
}

#[tokio::test]
async fn test_failed_create_after_drop_forgets_policy() {
    let host = Host::new().await;
    let id = Identifier::schema("DB", "PUBLIC", "MASK");
    let config = policy_config("VAL");
    let (_, outcome) = host
        .apply(masking_policy::TYPE_NAME, Some(&config), &id)
        .await;
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);

    host.remote.fail_next(
        Operation::Create,
        RemoteError::Conflict {
            message: "unsupported return type".to_string(),
        },
    );
    let retyped = config.with("return_data_type", "NUMBER");
    let (plan, outcome) = host
        .apply(masking_policy::TYPE_NAME, Some(&retyped), &id)
        .await;
    assert_eq!(plan.action, ResourceAction::Replace);
    assert!(!outcome.is_success());
    assert_eq!(
        outcome.completed,
        vec![Step::Drop {
            identifier: id.clone()
        }]
    );
    assert!(outcome.state.is_none());
    assert_eq!(host.remote.object_count(ObjectKind::MaskingPolicy), 0);
    assert!(host.state(masking_policy::TYPE_NAME, &id).is_none());
    assert!(host.store.is_empty());

    // The next plan starts over with a create.
    let plan = host
        .plan(masking_policy::TYPE_NAME, Some(&retyped), &id)
        .await;
    assert_eq!(plan.action, ResourceAction::Create);
}

#[tokio::test]
async fn test_lower_case_argument_name_converges() {
    let host = Host::new().await;
    let id = Identifier::schema("DB", "PUBLIC", "MASK");
    let config = policy_config("val");
    let (plan, outcome) = host
        .apply(masking_policy::TYPE_NAME, Some(&config), &id)
        .await;
    assert_eq!(plan.action, ResourceAction::Create);
    assert!(outcome.is_success(), "{:?}", outcome.diagnostics);

    let plan = host
        .plan(masking_policy::TYPE_NAME, Some(&config), &id)
        .await;
    assert!(plan.is_empty(), "{plan:?}");
}
