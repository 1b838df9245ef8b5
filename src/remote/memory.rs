//! In-process account used by the offline CLI mode and the lifecycle tests.
//!
//! Behaves like the parts of Snowflake the engine depends on: property
//! defaults, unsets reverting to defaults, parameter inheritance through
//! default, account and object levels, SHOW filtering and the refusals the
//! real service produces for invalid combinations.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use super::{
    Alteration, ClientFactory, CreateRequest, ObjectKind, ParameterLevel, ParameterScope,
    ParameterValue, RemoteClient, RemoteError, RemoteObject, ShowFilter, ShowScope, sql,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::identifier::Identifier;
use crate::value::{Record, Value};

pub const OWNER: &str = "ACCOUNTADMIN";

/// Remote operations, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Show,
    Describe,
    Create,
    Alter,
    Drop,
    Rename,
    SetParameters,
    UnsetParameters,
    ShowParameters,
}

type ObjectKey = (ObjectKind, Identifier);

#[derive(Debug, Default)]
struct Account {
    objects: BTreeMap<ObjectKey, Record>,
    /// Object-level parameter overrides.
    overrides: BTreeMap<ObjectKey, Record>,
    account_parameters: Record,
    statements: Vec<String>,
    failures: Vec<(Operation, RemoteError)>,
}

#[derive(Debug, Default)]
pub struct MemoryRemote {
    account: Mutex<Account>,
    latency: Mutex<Option<Duration>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next call of `operation` fails with `error`.
    pub fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.lock().failures.push((operation, error));
    }

    /// Delay applied before every call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = Some(latency);
    }

    /// SQL statements issued so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn clear_statements(&self) {
        self.lock().statements.clear();
    }

    pub fn object(&self, kind: ObjectKind, id: &Identifier) -> Option<Record> {
        self.lock().objects.get(&(kind, id.clone())).cloned()
    }

    pub fn object_count(&self, kind: ObjectKind) -> usize {
        self.lock().objects.keys().filter(|(k, _)| *k == kind).count()
    }

    fn lock(&self) -> MutexGuard<'_, Account> {
        self.account.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulated round trip: latency, statement log, injected failures.
    async fn enter(
        &self,
        operation: Operation,
        statements: Vec<String>,
    ) -> Result<(), RemoteError> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut account = self.lock();
        for statement in statements {
            tracing::trace!(%statement, "memory remote");
            account.statements.push(statement);
        }
        if let Some(pos) = account.failures.iter().position(|(op, _)| *op == operation) {
            let (_, error) = account.failures.remove(pos);
            return Err(error);
        }
        Ok(())
    }
}

fn conflict(message: impl Into<String>) -> RemoteError {
    RemoteError::Conflict {
        message: message.into(),
    }
}

fn defaults(kind: ObjectKind) -> Record {
    let pairs: Vec<(&str, Value)> = match kind {
        ObjectKind::Warehouse => vec![
            ("warehouse_type", Value::from("STANDARD")),
            ("warehouse_size", Value::from("XSMALL")),
            ("min_cluster_count", Value::Int(1)),
            ("max_cluster_count", Value::Int(1)),
            ("scaling_policy", Value::from("STANDARD")),
            ("auto_suspend", Value::Int(600)),
            ("auto_resume", Value::Bool(true)),
            ("enable_query_acceleration", Value::Bool(false)),
            ("query_acceleration_max_scale_factor", Value::Int(8)),
        ],
        ObjectKind::ComputePool => vec![
            ("auto_resume", Value::Bool(true)),
            ("auto_suspend_secs", Value::Int(3600)),
        ],
        ObjectKind::MaskingPolicy => vec![("exempt_other_policies", Value::Bool(false))],
        ObjectKind::RowAccessPolicy | ObjectKind::AccountParameter => Vec::new(),
    };
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn settable(kind: ObjectKind) -> &'static [&'static str] {
    match kind {
        ObjectKind::Warehouse => &[
            "warehouse_type",
            "warehouse_size",
            "min_cluster_count",
            "max_cluster_count",
            "scaling_policy",
            "auto_suspend",
            "auto_resume",
            "resource_monitor",
            "comment",
            "enable_query_acceleration",
            "query_acceleration_max_scale_factor",
            "resource_constraint",
        ],
        ObjectKind::ComputePool => &[
            "instance_family",
            "min_nodes",
            "max_nodes",
            "auto_resume",
            "auto_suspend_secs",
            "comment",
        ],
        ObjectKind::MaskingPolicy => &[
            "signature",
            "return_data_type",
            "body",
            "exempt_other_policies",
            "comment",
        ],
        ObjectKind::RowAccessPolicy => &["signature", "body", "comment"],
        ObjectKind::AccountParameter => &["value"],
    }
}

fn required(kind: ObjectKind) -> &'static [&'static str] {
    match kind {
        ObjectKind::ComputePool => &["instance_family", "min_nodes", "max_nodes"],
        ObjectKind::MaskingPolicy => &["signature", "return_data_type", "body"],
        ObjectKind::RowAccessPolicy => &["signature", "body"],
        ObjectKind::AccountParameter => &["value"],
        ObjectKind::Warehouse => &[],
    }
}

const UPPER_CASED: &[&str] = &[
    "warehouse_type",
    "warehouse_size",
    "scaling_policy",
    "resource_constraint",
    "instance_family",
    "return_data_type",
];

/// Values as the remote stores them.
fn normalize(key: &str, value: &Value) -> Value {
    match value {
        Value::String(s) if UPPER_CASED.contains(&key) => Value::from(s.to_uppercase()),
        Value::List(args) if key == "signature" => Value::List(
            args.iter()
                .map(|arg| match arg {
                    Value::Record(r) => {
                        let mut r = r.clone();
                        for field in ["name", "type"] {
                            if let Some(Value::String(v)) = r.get(field) {
                                let upper = Value::from(v.to_uppercase());
                                r.insert(field.to_string(), upper);
                            }
                        }
                        Value::Record(r)
                    }
                    other => other.clone(),
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn apply_properties(kind: ObjectKind, props: &mut Record, set: &Record) -> Result<(), RemoteError> {
    for (key, value) in set {
        if !settable(kind).contains(&key.as_str()) {
            return Err(conflict(format!(
                "invalid property '{}' for {}",
                key.to_uppercase(),
                kind.sql_name()
            )));
        }
        props.insert(key.clone(), normalize(key, value));
    }
    Ok(())
}

fn check_object(kind: ObjectKind, props: &Record) -> Result<(), RemoteError> {
    let int = |k: &str| props.get(k).and_then(Value::as_int);
    let text = |k: &str| props.get(k).and_then(Value::as_str);
    match kind {
        ObjectKind::Warehouse => {
            if let (Some(min), Some(max)) = (int("min_cluster_count"), int("max_cluster_count"))
                && min > max
            {
                return Err(conflict(
                    "MIN_CLUSTER_COUNT cannot be greater than MAX_CLUSTER_COUNT",
                ));
            }
            if let Some(constraint) = text("resource_constraint") {
                let ty = text("warehouse_type").unwrap_or("STANDARD");
                let fits = match ty {
                    "SNOWPARK-OPTIMIZED" => constraint.starts_with("MEMORY_"),
                    _ => constraint.starts_with("STANDARD_GEN_"),
                };
                if !fits {
                    return Err(conflict(format!(
                        "RESOURCE_CONSTRAINT {constraint} is not supported for warehouse type {ty}"
                    )));
                }
            }
        }
        ObjectKind::ComputePool => {
            if let (Some(min), Some(max)) = (int("min_nodes"), int("max_nodes"))
                && min > max
            {
                return Err(conflict("MIN_NODES cannot be greater than MAX_NODES"));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Built-in parameter defaults.
fn parameter_default(key: &str) -> Option<Value> {
    match key {
        "STATEMENT_TIMEOUT_IN_SECONDS" => Some(Value::Int(172_800)),
        "STATEMENT_QUEUED_TIMEOUT_IN_SECONDS" => Some(Value::Int(0)),
        "MAX_CONCURRENCY_LEVEL" => Some(Value::Int(8)),
        "TIMEZONE" => Some(Value::from("America/Los_Angeles")),
        _ => None,
    }
}

const ACCOUNT_PARAMETERS: &[&str] = &[
    "MAX_CONCURRENCY_LEVEL",
    "STATEMENT_QUEUED_TIMEOUT_IN_SECONDS",
    "STATEMENT_TIMEOUT_IN_SECONDS",
    "TIMEZONE",
];

fn object_parameters(kind: ObjectKind) -> &'static [&'static str] {
    match kind {
        ObjectKind::Warehouse => &[
            "MAX_CONCURRENCY_LEVEL",
            "STATEMENT_QUEUED_TIMEOUT_IN_SECONDS",
            "STATEMENT_TIMEOUT_IN_SECONDS",
        ],
        _ => &[],
    }
}

/// Coerce `value` to the type of the parameter's default.
fn coerce(key: &str, value: &Value) -> Result<Value, RemoteError> {
    let default = parameter_default(key)
        .ok_or_else(|| conflict(format!("invalid parameter '{key}'")))?;
    match (&default, value) {
        (Value::Int(_), Value::Int(_)) | (Value::String(_), Value::String(_)) => Ok(value.clone()),
        (Value::Int(_), Value::String(s)) => s
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|_| conflict(format!("invalid value '{s}' for parameter {key}"))),
        _ => Err(conflict(format!("invalid value {value} for parameter {key}"))),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn account_parameter_row(key: &str, value: &Value) -> Record {
    let mut row = Record::new();
    row.insert("value".to_string(), Value::from(text(value)));
    row.insert("level".to_string(), Value::from("ACCOUNT"));
    if let Some(default) = parameter_default(key) {
        row.insert("default".to_string(), Value::from(text(&default)));
    }
    row
}

/// SQL LIKE as a case-insensitive regex; `\` escapes the next character.
fn like_regex(pattern: &str) -> Result<Regex, RemoteError> {
    let mut re = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    re.push_str(&regex::escape(&next.to_string()));
                }
            }
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| conflict(format!("invalid LIKE pattern: {e}")))
}

fn in_scope(id: &Identifier, scope: &ShowScope) -> bool {
    match scope {
        ShowScope::Account => true,
        ShowScope::Database(database) => id.database_name() == Some(database.as_str()),
        ShowScope::Schema { database, schema } => {
            id.database_name() == Some(database.as_str())
                && id.schema_name() == Some(schema.as_str())
        }
    }
}

impl Account {
    fn inherited(&self, key: &str) -> Option<(Value, ParameterLevel)> {
        match self.account_parameters.get(key) {
            Some(value) => Some((value.clone(), ParameterLevel::Account)),
            None => parameter_default(key).map(|v| (v, ParameterLevel::Default)),
        }
    }

    fn require(&self, kind: ObjectKind, id: &Identifier) -> Result<(), RemoteError> {
        if self.objects.contains_key(&(kind, id.clone())) {
            Ok(())
        } else {
            Err(RemoteError::not_found(kind, id))
        }
    }

    fn object_parameter_key(&self, kind: ObjectKind, key: &str) -> Result<(), RemoteError> {
        if object_parameters(kind).contains(&key) {
            Ok(())
        } else {
            Err(conflict(format!(
                "invalid parameter '{key}' for {}",
                kind.sql_name()
            )))
        }
    }

    fn account_parameter_key(key: &str) -> Result<(), RemoteError> {
        if ACCOUNT_PARAMETERS.contains(&key) {
            Ok(())
        } else {
            Err(conflict(format!("invalid parameter '{key}'")))
        }
    }
}

#[async_trait]
impl RemoteClient for MemoryRemote {
    async fn show(
        &self,
        kind: ObjectKind,
        filter: &ShowFilter,
    ) -> Result<Vec<RemoteObject>, RemoteError> {
        self.enter(Operation::Show, vec![sql::show(kind, filter)])
            .await?;
        let like = filter.like.as_deref().map(like_regex).transpose()?;
        let account = self.lock();

        let mut rows: Vec<RemoteObject> = match kind {
            ObjectKind::AccountParameter => account
                .account_parameters
                .iter()
                .map(|(key, value)| RemoteObject {
                    identifier: Identifier::account(key.clone()),
                    properties: account_parameter_row(key, value),
                })
                .collect(),
            _ => account
                .objects
                .iter()
                .filter(|((k, _), _)| *k == kind)
                .map(|((_, id), props)| RemoteObject {
                    identifier: id.clone(),
                    properties: props.clone(),
                })
                .collect(),
        };

        rows.retain(|o| in_scope(&o.identifier, &filter.scope));
        if let Some(like) = &like {
            rows.retain(|o| like.is_match(o.identifier.name()));
        }
        if let Some(prefix) = &filter.starts_with {
            rows.retain(|o| o.identifier.name().starts_with(prefix.as_str()));
        }
        rows.sort_by(|a, b| a.identifier.name().cmp(b.identifier.name()));
        if let Some(limit) = &filter.limit {
            if let Some(from) = &limit.from {
                let start = rows
                    .iter()
                    .position(|o| o.identifier.name().starts_with(from.as_str()))
                    .unwrap_or(rows.len());
                rows.drain(..start);
            }
            rows.truncate(usize::try_from(limit.rows).unwrap_or(usize::MAX));
        }
        Ok(rows)
    }

    async fn describe(&self, kind: ObjectKind, id: &Identifier) -> Result<Record, RemoteError> {
        self.enter(Operation::Describe, vec![sql::describe(kind, id)])
            .await?;
        let account = self.lock();
        match kind {
            ObjectKind::AccountParameter => account
                .account_parameters
                .get(id.name())
                .map(|value| account_parameter_row(id.name(), value))
                .ok_or_else(|| RemoteError::not_found(kind, id)),
            _ => account
                .objects
                .get(&(kind, id.clone()))
                .cloned()
                .ok_or_else(|| RemoteError::not_found(kind, id)),
        }
    }

    async fn create(
        &self,
        kind: ObjectKind,
        id: &Identifier,
        request: &CreateRequest,
    ) -> Result<(), RemoteError> {
        self.enter(Operation::Create, vec![sql::create(kind, id, request)])
            .await?;
        let mut account = self.lock();

        if kind == ObjectKind::AccountParameter {
            Account::account_parameter_key(id.name())?;
            let value = request
                .properties
                .get("value")
                .ok_or_else(|| conflict("missing parameter value"))?;
            let value = coerce(id.name(), value)?;
            account
                .account_parameters
                .insert(id.name().to_string(), value);
            return Ok(());
        }

        let key = (kind, id.clone());
        if account.objects.contains_key(&key) {
            return Err(conflict(format!(
                "Object '{}' already exists.",
                id.fully_qualified_name()
            )));
        }

        let mut props = defaults(kind);
        let mut set = request.properties.clone();
        let suspended = set
            .remove("initially_suspended")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        apply_properties(kind, &mut props, &set)?;
        if let Some(missing) = required(kind).iter().find(|k| !props.contains_key(**k)) {
            return Err(conflict(format!(
                "missing required property {}",
                missing.to_uppercase()
            )));
        }
        check_object(kind, &props)?;

        let mut overrides = Record::new();
        for (param, value) in &request.parameters {
            account.object_parameter_key(kind, param)?;
            overrides.insert(param.clone(), coerce(param, value)?);
        }

        if matches!(kind, ObjectKind::Warehouse | ObjectKind::ComputePool) {
            let state = match (kind, suspended) {
                (_, true) => "SUSPENDED",
                (ObjectKind::Warehouse, false) => "STARTED",
                _ => "IDLE",
            };
            props.insert("state".to_string(), Value::from(state));
        }
        props.insert("owner".to_string(), Value::from(OWNER));

        account.objects.insert(key.clone(), props);
        if !overrides.is_empty() {
            account.overrides.insert(key, overrides);
        }
        Ok(())
    }

    async fn alter(
        &self,
        kind: ObjectKind,
        id: &Identifier,
        alteration: &Alteration,
    ) -> Result<(), RemoteError> {
        self.enter(Operation::Alter, sql::alter(kind, id, alteration))
            .await?;
        let mut account = self.lock();

        if kind == ObjectKind::AccountParameter {
            if !account.account_parameters.contains_key(id.name()) {
                return Err(RemoteError::not_found(kind, id));
            }
            if let Some(value) = alteration.set.get("value") {
                let value = coerce(id.name(), value)?;
                account
                    .account_parameters
                    .insert(id.name().to_string(), value);
            }
            return Ok(());
        }

        let key = (kind, id.clone());
        let mut props = account
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| RemoteError::not_found(kind, id))?;
        let defaults = defaults(kind);
        for unset in &alteration.unset {
            if !settable(kind).contains(&unset.as_str()) {
                return Err(conflict(format!(
                    "invalid property '{}' for {}",
                    unset.to_uppercase(),
                    kind.sql_name()
                )));
            }
            if required(kind).contains(&unset.as_str()) {
                return Err(conflict(format!(
                    "property {} cannot be unset",
                    unset.to_uppercase()
                )));
            }
            match defaults.get(unset) {
                Some(default) => props.insert(unset.clone(), default.clone()),
                None => props.remove(unset),
            };
        }
        apply_properties(kind, &mut props, &alteration.set)?;
        check_object(kind, &props)?;
        account.objects.insert(key, props);
        Ok(())
    }

    async fn drop(&self, kind: ObjectKind, id: &Identifier) -> Result<(), RemoteError> {
        self.enter(Operation::Drop, vec![sql::drop(kind, id)])
            .await?;
        let mut account = self.lock();
        let removed = match kind {
            ObjectKind::AccountParameter => account.account_parameters.remove(id.name()).is_some(),
            _ => {
                let key = (kind, id.clone());
                account.overrides.remove(&key);
                account.objects.remove(&key).is_some()
            }
        };
        if removed {
            Ok(())
        } else {
            Err(RemoteError::not_found(kind, id))
        }
    }

    async fn rename(
        &self,
        kind: ObjectKind,
        from: &Identifier,
        to: &Identifier,
    ) -> Result<(), RemoteError> {
        self.enter(Operation::Rename, vec![sql::rename(kind, from, to)])
            .await?;
        if kind == ObjectKind::AccountParameter {
            return Err(conflict("parameters cannot be renamed"));
        }
        let mut account = self.lock();
        let source = (kind, from.clone());
        let target = (kind, to.clone());
        if account.objects.contains_key(&target) {
            return Err(conflict(format!(
                "Object '{}' already exists.",
                to.fully_qualified_name()
            )));
        }
        let props = account
            .objects
            .remove(&source)
            .ok_or_else(|| RemoteError::not_found(kind, from))?;
        account.objects.insert(target.clone(), props);
        if let Some(overrides) = account.overrides.remove(&source) {
            account.overrides.insert(target, overrides);
        }
        Ok(())
    }

    async fn set_parameters(
        &self,
        scope: &ParameterScope,
        values: &Record,
    ) -> Result<(), RemoteError> {
        self.enter(
            Operation::SetParameters,
            vec![sql::set_parameters(scope, values)],
        )
        .await?;
        let mut account = self.lock();
        match scope {
            ParameterScope::Account => {
                let mut coerced = Record::new();
                for (key, value) in values {
                    Account::account_parameter_key(key)?;
                    coerced.insert(key.clone(), coerce(key, value)?);
                }
                account.account_parameters.extend(coerced);
            }
            ParameterScope::Object { kind, identifier } => {
                account.require(*kind, identifier)?;
                let mut coerced = Record::new();
                for (key, value) in values {
                    account.object_parameter_key(*kind, key)?;
                    coerced.insert(key.clone(), coerce(key, value)?);
                }
                account
                    .overrides
                    .entry((*kind, identifier.clone()))
                    .or_default()
                    .extend(coerced);
            }
        }
        Ok(())
    }

    async fn unset_parameters(
        &self,
        scope: &ParameterScope,
        keys: &[String],
    ) -> Result<(), RemoteError> {
        self.enter(
            Operation::UnsetParameters,
            vec![sql::unset_parameters(scope, keys)],
        )
        .await?;
        let mut account = self.lock();
        match scope {
            ParameterScope::Account => {
                for key in keys {
                    Account::account_parameter_key(key)?;
                }
                for key in keys {
                    account.account_parameters.remove(key);
                }
            }
            ParameterScope::Object { kind, identifier } => {
                account.require(*kind, identifier)?;
                for key in keys {
                    account.object_parameter_key(*kind, key)?;
                }
                if let Some(overrides) = account.overrides.get_mut(&(*kind, identifier.clone())) {
                    for key in keys {
                        overrides.remove(key);
                    }
                }
            }
        }
        Ok(())
    }

    async fn show_parameters(
        &self,
        scope: &ParameterScope,
    ) -> Result<Vec<ParameterValue>, RemoteError> {
        self.enter(
            Operation::ShowParameters,
            vec![sql::show_parameters(scope)],
        )
        .await?;
        let account = self.lock();
        let mut values = Vec::new();
        match scope {
            ParameterScope::Account => {
                for key in ACCOUNT_PARAMETERS {
                    let Some(default) = parameter_default(key) else {
                        continue;
                    };
                    let Some((value, level)) = account.inherited(key) else {
                        continue;
                    };
                    values.push(ParameterValue {
                        key: key.to_string(),
                        value,
                        level,
                        inherited: default,
                    });
                }
            }
            ParameterScope::Object { kind, identifier } => {
                account.require(*kind, identifier)?;
                let overrides = account.overrides.get(&(*kind, identifier.clone()));
                for key in object_parameters(*kind) {
                    let Some((inherited, inherited_level)) = account.inherited(key) else {
                        continue;
                    };
                    let (value, level) = match overrides.and_then(|o| o.get(*key)) {
                        Some(value) => (value.clone(), ParameterLevel::Object),
                        None => (inherited.clone(), inherited_level),
                    };
                    values.push(ParameterValue {
                        key: key.to_string(),
                        value,
                        level,
                        inherited,
                    });
                }
            }
        }
        Ok(values)
    }
}

/// Hands out the same shared [`MemoryRemote`] on every Configure.
#[derive(Debug, Clone, Default)]
pub struct MemoryFactory {
    remote: Arc<MemoryRemote>,
    connections: Arc<AtomicUsize>,
}

impl MemoryFactory {
    pub fn new(remote: Arc<MemoryRemote>) -> Self {
        Self {
            remote,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn remote(&self) -> Arc<MemoryRemote> {
        self.remote.clone()
    }

    /// Number of clients handed out so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientFactory for MemoryFactory {
    async fn connect(
        &self,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn RemoteClient>, ProviderError> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            account = config.account_name.as_deref().unwrap_or("<memory>"),
            "connected to in-memory account"
        );
        Ok(self.remote.clone())
    }
}
