//! Planner: reconciles configuration, prior state and the live remote into a
//! [`Plan`].
//!
//! Planning is pure. The caller performs the remote read and hands the
//! snapshot in, so the same inputs always produce the same plan.
//!
//! Per attribute, in descriptor order:
//!
//! * `Set(v)` converges the remote on `v`. Enum and case-insensitive
//!   attributes compare without regard to case, but the planned value keeps
//!   the user's spelling.
//! * `Absent` adopts whatever the remote reports (defer-to-remote). If the
//!   attribute was configured at the last apply, removing it from
//!   configuration unsets it so the remote default comes back.
//! * `Null` unsets a value this configuration previously owned, or one that
//!   drifted since the last apply.
//!
//! Parameters compare on the `(value, level)` pair: a value inherited from
//! the account is not the same as the same value set on the object.

use std::collections::BTreeSet;

use crate::diagnostics::{AttributePath, Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::identifier::Identifier;
use crate::plan::{Drift, FieldAction, Plan, PlanEntry, ResourceAction};
use crate::remote::ParameterLevel;
use crate::schema::{AttributeDescriptor, Category, IdentityPart, ResourceSchema, Source};
use crate::snapshot::RemoteSnapshot;
use crate::state::InstanceState;
use crate::value::{Attributes, Config, ConfigValue, Value};

/// Compute the plan for one instance.
///
/// `config == None` means the instance block was removed. `remote` is the
/// snapshot read at the prior identifier; `None` when there is no prior state
/// or the object no longer exists.
pub fn plan(
    schema: &ResourceSchema,
    config: Option<&Config>,
    prior: Option<&InstanceState>,
    remote: Option<&RemoteSnapshot>,
) -> Result<Plan, ProviderError> {
    let Some(config) = config else {
        return plan_destroy(schema, prior, remote);
    };

    let diagnostics = schema.block.validate(config);
    if diagnostics.has_errors() {
        return Err(ProviderError::Validation(diagnostics));
    }

    let identifier = schema.identifier_from_config(config)?;
    let configured: BTreeSet<String> = config
        .iter()
        .filter(|(_, v)| v.as_set().is_some())
        .map(|(name, _)| name.to_string())
        .collect();

    let mut planner = Planner {
        schema,
        config,
        identifier,
        entries: Vec::new(),
        planned: Attributes::new(),
        diagnostics,
        replace: false,
    };

    let action = match (prior, remote) {
        (Some(prior), Some(remote)) => planner.existing(prior, remote),
        (prior, _) => {
            if let Some(prior) = prior {
                planner.diagnostics.push(
                    Diagnostic::warning(format!(
                        "{} {} no longer exists and will be created again",
                        schema.kind, prior.identifier
                    ))
                    .with_detail("the object was removed outside of this configuration"),
                );
            }
            planner.create()
        }
    };

    let mut plan = Plan {
        resource_type: schema.type_name.to_string(),
        action,
        identifier: planner.identifier,
        prior_identifier: prior.map(|p| p.identifier.clone()),
        entries: planner.entries,
        planned: planner.planned,
        configured,
        diagnostics: planner.diagnostics,
    };

    if plan.action == ResourceAction::Replace {
        forget_adopted_values(&mut plan);
    }
    plan.entries.sort_by_key(|e| !e.rename);

    tracing::debug!(
        resource_type = schema.type_name,
        identifier = %plan.identifier,
        action = %plan.action,
        changes = plan.changes().count(),
        drifted = plan.drifted().count(),
        "plan computed"
    );
    Ok(plan)
}

fn plan_destroy(
    schema: &ResourceSchema,
    prior: Option<&InstanceState>,
    remote: Option<&RemoteSnapshot>,
) -> Result<Plan, ProviderError> {
    let prior = prior.ok_or_else(|| {
        ProviderError::Protocol(format!(
            "{}: nothing to plan without configuration or prior state",
            schema.type_name
        ))
    })?;

    let mut diagnostics = Diagnostics::new();
    if remote.is_none() {
        diagnostics.push(Diagnostic::warning(format!(
            "{} {} is already gone",
            schema.kind, prior.identifier
        )));
    }

    let entries = schema
        .attributes()
        .iter()
        .filter(|a| !a.is_computed())
        .filter_map(|attr| {
            let before = remote
                .and_then(|r| r.value_of(schema, attr))
                .or_else(|| prior.attribute(attr.name).cloned())?;
            let mut entry = PlanEntry::new(attr.name, FieldAction::DestroyField);
            entry.before = Some(before);
            Some(entry)
        })
        .collect();

    Ok(Plan {
        resource_type: schema.type_name.to_string(),
        action: ResourceAction::Destroy,
        identifier: prior.identifier.clone(),
        prior_identifier: Some(prior.identifier.clone()),
        entries,
        planned: Attributes::new(),
        configured: BTreeSet::new(),
        diagnostics,
    })
}

/// A recreated object starts from remote defaults, so values adopted from
/// the old object cannot be predicted.
fn forget_adopted_values(plan: &mut Plan) {
    for entry in &mut plan.entries {
        if !plan.configured.contains(&entry.attribute) && entry.defer_to_remote {
            entry.after = None;
            plan.planned.remove(&entry.attribute);
        }
    }
}

struct Planner<'a> {
    schema: &'a ResourceSchema,
    config: &'a Config,
    identifier: Identifier,
    entries: Vec<PlanEntry>,
    planned: Attributes,
    diagnostics: Diagnostics,
    replace: bool,
}

impl Planner<'_> {
    fn create(&mut self) -> ResourceAction {
        for attr in self.schema.attributes() {
            if attr.is_computed() {
                self.computed(attr, None);
                continue;
            }
            let entry = match self.config.get(attr.name) {
                ConfigValue::Set(v) => {
                    self.planned.insert(attr.name.to_string(), v.clone());
                    let mut entry = PlanEntry::new(attr.name, FieldAction::Create);
                    entry.after = Some(v.clone());
                    entry
                }
                ConfigValue::Null => PlanEntry::new(attr.name, FieldAction::NoOp),
                ConfigValue::Absent => {
                    let mut entry = PlanEntry::new(attr.name, FieldAction::NoOp);
                    entry.defer_to_remote =
                        !matches!(attr.source, Source::CreateOnly(_) | Source::None);
                    entry
                }
            };
            self.entries.push(entry);
        }
        ResourceAction::Create
    }

    fn existing(&mut self, prior: &InstanceState, remote: &RemoteSnapshot) -> ResourceAction {
        for attr in self.schema.attributes() {
            match (&attr.category, &attr.source) {
                (Category::Computed, _) => self.computed(attr, Some(remote)),
                (_, Source::Identity(part)) => self.identity(attr, *part, remote),
                (_, Source::CreateOnly(_) | Source::None) => self.host_side(attr),
                (Category::Parameter(_), Source::Parameter(key)) => {
                    self.parameter(attr, key, prior, remote)
                }
                _ => self.property(attr, prior, remote),
            }
        }

        if self.replace {
            ResourceAction::Replace
        } else if self.entries.iter().any(PlanEntry::is_change) {
            ResourceAction::Update
        } else {
            ResourceAction::NoOp
        }
    }

    fn computed(&mut self, attr: &AttributeDescriptor, remote: Option<&RemoteSnapshot>) {
        let value = match attr.source {
            Source::FullyQualifiedName => {
                Some(Value::from(self.identifier.fully_qualified_name()))
            }
            _ => remote.and_then(|r| r.value_of(self.schema, attr)),
        };
        if let Some(value) = value {
            self.planned.insert(attr.name.to_string(), value);
        }
    }

    /// Identity values compare exactly: a change of case or quoting is a
    /// change of identifier.
    fn identity(
        &mut self,
        attr: &AttributeDescriptor,
        part: IdentityPart,
        remote: &RemoteSnapshot,
    ) {
        let desired = self.config.get(attr.name).as_set().cloned();
        let current = self.schema.identity_value(part, &remote.identifier);

        let mut entry = PlanEntry::new(attr.name, FieldAction::NoOp);
        entry.before = current.clone();
        entry.after = desired.clone();
        if desired != current {
            entry.action = FieldAction::Update;
            if attr.category == Category::Rename {
                entry.rename = true;
            } else {
                self.replace = true;
            }
        }
        if let Some(desired) = desired {
            self.planned.insert(attr.name.to_string(), desired);
        }
        self.entries.push(entry);
    }

    /// Write-on-create and host-only attributes never diff after creation;
    /// the stored value mirrors configuration.
    fn host_side(&mut self, attr: &AttributeDescriptor) {
        let mut entry = PlanEntry::new(attr.name, FieldAction::NoOp);
        if let Some(v) = self.config.get(attr.name).as_set() {
            entry.after = Some(v.clone());
            self.planned.insert(attr.name.to_string(), v.clone());
        }
        self.entries.push(entry);
    }

    fn property(
        &mut self,
        attr: &AttributeDescriptor,
        prior: &InstanceState,
        remote: &RemoteSnapshot,
    ) {
        let remote_value = remote.value_of(self.schema, attr);
        let prior_value = prior.attribute(attr.name);
        let drifted = !attr.optional_values_equal(prior_value, remote_value.as_ref());
        let drift = drifted.then(|| Drift {
            recorded: prior_value.cloned(),
            observed: remote_value.clone(),
        });

        let mut entry = PlanEntry::new(attr.name, FieldAction::NoOp);
        entry.before = remote_value.clone();

        match self.config.get(attr.name) {
            ConfigValue::Set(v) => {
                entry.drift = drift;
                entry.after = Some(v.clone());
                self.planned.insert(attr.name.to_string(), v.clone());
                let converged = remote_value
                    .as_ref()
                    .is_some_and(|r| attr.values_equal(v, r));
                if !converged {
                    entry.action = FieldAction::Update;
                    if attr.category == Category::Structural {
                        self.replace = true;
                    }
                }
            }
            ConfigValue::Null => {
                entry.drift = drift;
                if remote_value.is_some() && (prior.was_configured(attr.name) || drifted) {
                    entry.action = FieldAction::DestroyField;
                    entry.defer_to_remote = true;
                    if attr.category == Category::Structural {
                        self.replace = true;
                    }
                }
            }
            ConfigValue::Absent => {
                entry.defer_to_remote = true;
                if drifted {
                    self.warn_drift(attr, prior_value, remote_value.as_ref());
                }
                let unset = prior.was_configured(attr.name)
                    && remote_value.is_some()
                    && attr.category != Category::Structural;
                if unset {
                    entry.action = FieldAction::Update;
                } else {
                    self.adopt(attr, &mut entry, remote_value);
                }
            }
        }
        self.entries.push(entry);
    }

    fn parameter(
        &mut self,
        attr: &AttributeDescriptor,
        key: &str,
        prior: &InstanceState,
        remote: &RemoteSnapshot,
    ) {
        let current = remote.parameter(key);
        let remote_value = current.map(|p| p.value.clone());
        let level = current.map(|p| p.level);
        let prior_value = prior.attribute(attr.name);
        let prior_level = prior.parameter(key).map(|p| p.level);

        let drifted = !attr.optional_values_equal(prior_value, remote_value.as_ref())
            || (prior_level.is_some() && prior_level != level);
        let drift = drifted.then(|| Drift {
            recorded: prior_value.cloned(),
            observed: remote_value.clone(),
        });
        let on_object = level == Some(ParameterLevel::Object);

        let mut entry = PlanEntry::new(attr.name, FieldAction::NoOp);
        entry.before = remote_value.clone();
        entry.level = level;

        match self.config.get(attr.name) {
            ConfigValue::Set(v) => {
                entry.drift = drift;
                entry.after = Some(v.clone());
                self.planned.insert(attr.name.to_string(), v.clone());
                let converged =
                    on_object && remote_value.as_ref().is_some_and(|r| attr.values_equal(v, r));
                if !converged {
                    entry.action = FieldAction::Update;
                }
            }
            ConfigValue::Null => {
                entry.drift = drift;
                if on_object {
                    entry.action = FieldAction::DestroyField;
                    entry.defer_to_remote = true;
                } else {
                    self.adopt(attr, &mut entry, remote_value);
                }
            }
            ConfigValue::Absent => {
                entry.defer_to_remote = true;
                if drifted {
                    self.warn_drift(attr, prior_value, remote_value.as_ref());
                }
                let matches_inherited =
                    current.is_some_and(|p| attr.values_equal(&p.value, &p.inherited));
                if on_object && !matches_inherited && prior.was_configured(attr.name) {
                    entry.action = FieldAction::Update;
                } else {
                    self.adopt(attr, &mut entry, remote_value);
                }
            }
        }
        self.entries.push(entry);
    }

    fn adopt(&mut self, attr: &AttributeDescriptor, entry: &mut PlanEntry, remote: Option<Value>) {
        if let Some(value) = &remote {
            self.planned.insert(attr.name.to_string(), value.clone());
        }
        entry.after = remote;
    }

    fn warn_drift(
        &mut self,
        attr: &AttributeDescriptor,
        recorded: Option<&Value>,
        observed: Option<&Value>,
    ) {
        let show = |v: Option<&Value>| v.map_or_else(|| "null".to_string(), Value::to_string);
        self.diagnostics.push(
            Diagnostic::warning(format!(
                "\"{}\" changed outside of configuration; following the remote value",
                attr.name
            ))
            .at(AttributePath::root(attr.name))
            .with_detail(format!("{} -> {}", show(recorded), show(observed))),
        );
    }
}

/// Refresh `prior` against `remote`, keeping the stored spelling of values
/// the remote considers equal. Every changed attribute yields a warning.
pub fn refresh(
    schema: &ResourceSchema,
    prior: &InstanceState,
    remote: &RemoteSnapshot,
) -> (InstanceState, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let attributes = remote.settle(schema, &prior.attributes);
    for attr in schema.attributes().iter().filter(|a| !a.is_computed()) {
        let before = prior.attribute(attr.name);
        let after = attributes.get(attr.name);
        if !attr.optional_values_equal(before, after) {
            let show = |v: Option<&Value>| v.map_or_else(|| "null".to_string(), Value::to_string);
            diagnostics.push(
                Diagnostic::warning(format!("\"{}\" drifted", attr.name))
                    .at(AttributePath::root(attr.name))
                    .with_detail(format!("{} -> {}", show(before), show(after))),
            );
        }
    }

    let state = InstanceState {
        schema_version: schema.version,
        identifier: remote.identifier.clone(),
        attributes,
        show_output: remote.show_output.clone(),
        parameters: remote.parameters.clone(),
        private: prior.private.clone(),
    };
    (state, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ParameterValue;
    use crate::resources::warehouse;
    use crate::state::PrivateState;
    use crate::value::Record;

    fn remote(props: &[(&str, Value)], params: Vec<ParameterValue>) -> RemoteSnapshot {
        let object: Record = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        RemoteSnapshot {
            identifier: Identifier::account("W1"),
            object: object.clone(),
            show_output: object,
            parameters: params,
        }
    }

    fn timeout(value: i64, level: ParameterLevel, inherited: i64) -> ParameterValue {
        ParameterValue {
            key: "STATEMENT_TIMEOUT_IN_SECONDS".to_string(),
            value: Value::Int(value),
            level,
            inherited: Value::Int(inherited),
        }
    }

    fn prior_from(snapshot: &RemoteSnapshot, configured: &[&str]) -> InstanceState {
        let schema = warehouse::schema();
        InstanceState {
            schema_version: 1,
            identifier: snapshot.identifier.clone(),
            attributes: snapshot.hydrate(&schema),
            show_output: snapshot.show_output.clone(),
            parameters: snapshot.parameters.clone(),
            private: PrivateState {
                configured: configured.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    fn small() -> RemoteSnapshot {
        remote(
            &[
                ("warehouse_type", Value::from("STANDARD")),
                ("warehouse_size", Value::from("SMALL")),
                ("auto_suspend", Value::Int(600)),
            ],
            vec![timeout(172_800, ParameterLevel::Default, 172_800)],
        )
    }

    #[test]
    fn test_create_records_defer_for_absent() {
        let schema = warehouse::schema();
        let config = Config::new().with("name", "W1");
        let plan = plan(&schema, Some(&config), None, None).unwrap();
        assert_eq!(plan.action, ResourceAction::Create);
        let size = plan.entry("warehouse_size").unwrap();
        assert!(size.defer_to_remote);
        assert_eq!(plan.entry("name").unwrap().action, FieldAction::Create);
        assert_eq!(
            plan.planned["fully_qualified_name"],
            Value::from("\"W1\"")
        );
        assert!(!plan.entry("initially_suspended").unwrap().defer_to_remote);
    }

    #[test]
    fn test_case_only_difference_is_noop_and_keeps_spelling() {
        let schema = warehouse::schema();
        let snapshot = small();
        let prior = prior_from(&snapshot, &["name", "warehouse_size"]);
        let config = Config::new()
            .with("name", "W1")
            .with("warehouse_size", "small");
        let plan = plan(&schema, Some(&config), Some(&prior), Some(&snapshot)).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.planned["warehouse_size"], Value::from("small"));
    }

    #[test]
    fn test_removing_configured_attribute_unsets_it() {
        let schema = warehouse::schema();
        let snapshot = small();
        let prior = prior_from(&snapshot, &["name", "warehouse_size"]);
        let config = Config::new().with("name", "W1");
        let plan = plan(&schema, Some(&config), Some(&prior), Some(&snapshot)).unwrap();
        let entry = plan.entry("warehouse_size").unwrap();
        assert_eq!(plan.action, ResourceAction::Update);
        assert_eq!(entry.action, FieldAction::Update);
        assert_eq!(entry.before, Some(Value::from("SMALL")));
        assert_eq!(entry.after, None);
        assert!(entry.defer_to_remote);
    }

    #[test]
    fn test_absent_drift_is_a_warning_only() {
        let schema = warehouse::schema();
        let prior = prior_from(&small(), &["name"]);
        let mut snapshot = small();
        snapshot
            .object
            .insert("auto_suspend".to_string(), Value::Int(60));
        let config = Config::new().with("name", "W1");
        let plan = plan(&schema, Some(&config), Some(&prior), Some(&snapshot)).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.planned["auto_suspend"], Value::Int(60));
        assert_eq!(plan.diagnostics.warnings().count(), 1);
        assert!(!plan.diagnostics.has_errors());
    }

    #[test]
    fn test_parameter_level_change_is_an_update() {
        let schema = warehouse::schema();
        let snapshot = remote(&[], vec![timeout(86_400, ParameterLevel::Account, 86_400)]);
        let prior = prior_from(&snapshot, &["name"]);
        let config = Config::new()
            .with("name", "W1")
            .with("statement_timeout_in_seconds", 86_400);
        let plan = plan(&schema, Some(&config), Some(&prior), Some(&snapshot)).unwrap();
        let entry = plan.entry("statement_timeout_in_seconds").unwrap();
        assert_eq!(entry.action, FieldAction::Update);
        assert_eq!(entry.level, Some(ParameterLevel::Account));
    }

    #[test]
    fn test_parameter_matching_inherited_value_is_noop() {
        let schema = warehouse::schema();
        let snapshot = remote(&[], vec![timeout(86_400, ParameterLevel::Object, 86_400)]);
        let prior = prior_from(&snapshot, &["name", "statement_timeout_in_seconds"]);
        let config = Config::new().with("name", "W1");
        let plan = plan(&schema, Some(&config), Some(&prior), Some(&snapshot)).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_rename_is_first_entry() {
        let schema = warehouse::schema();
        let snapshot = small();
        let prior = prior_from(&snapshot, &["name", "warehouse_size", "comment"]);
        let config = Config::new()
            .with("name", "W2")
            .with("warehouse_size", "MEDIUM");
        let plan = plan(&schema, Some(&config), Some(&prior), Some(&snapshot)).unwrap();
        assert_eq!(plan.action, ResourceAction::Update);
        assert!(plan.entries[0].rename);
        assert_eq!(plan.identifier, Identifier::account("W2"));
        assert_eq!(plan.prior_identifier, Some(Identifier::account("W1")));
    }

    #[test]
    fn test_quoting_change_is_a_rename() {
        let schema = warehouse::schema();
        let snapshot = small();
        let prior = prior_from(&snapshot, &["name"]);
        let config = Config::new().with("name", "\"W1\"");
        let plan = plan(&schema, Some(&config), Some(&prior), Some(&snapshot)).unwrap();
        assert!(!plan.is_empty());
        assert!(plan.rename().is_some());
    }

    #[test]
    fn test_null_unsets_only_owned_or_drifted_values() {
        let schema = warehouse::schema();
        let mut snapshot = small();
        snapshot
            .object
            .insert("comment".to_string(), Value::from("hi"));

        let prior = prior_from(&snapshot, &["name"]);
        let config = Config::new().with("name", "W1").with_null("comment");
        let plan1 = plan(&schema, Some(&config), Some(&prior), Some(&snapshot)).unwrap();
        assert!(plan1.is_empty());

        let prior = prior_from(&snapshot, &["name", "comment"]);
        let plan2 = plan(&schema, Some(&config), Some(&prior), Some(&snapshot)).unwrap();
        assert_eq!(
            plan2.entry("comment").unwrap().action,
            FieldAction::DestroyField
        );
    }

    #[test]
    fn test_validation_errors_abort_planning() {
        let schema = warehouse::schema();
        let config = Config::new()
            .with("name", "W1")
            .with("auto_suspend", -1);
        let err = plan(&schema, Some(&config), None, None).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_removed_block_destroys() {
        let schema = warehouse::schema();
        let snapshot = small();
        let prior = prior_from(&snapshot, &["name"]);
        let plan = plan(&schema, None, Some(&prior), Some(&snapshot)).unwrap();
        assert_eq!(plan.action, ResourceAction::Destroy);
        assert!(plan.entries.iter().all(|e| e.action == FieldAction::DestroyField));
    }

    #[test]
    fn test_vanished_object_is_recreated_with_warning() {
        let schema = warehouse::schema();
        let prior = prior_from(&small(), &["name"]);
        let config = Config::new().with("name", "W1");
        let plan = plan(&schema, Some(&config), Some(&prior), None).unwrap();
        assert_eq!(plan.action, ResourceAction::Create);
        assert_eq!(plan.diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_refresh_keeps_spelling_and_reports_drift() {
        let schema = warehouse::schema();
        let mut prior = prior_from(&small(), &["name", "warehouse_size"]);
        prior
            .attributes
            .insert("warehouse_size".to_string(), Value::from("small"));
        let mut snapshot = small();
        snapshot
            .object
            .insert("auto_suspend".to_string(), Value::Int(0));
        let (state, diags) = refresh(&schema, &prior, &snapshot);
        assert_eq!(state.attributes["warehouse_size"], Value::from("small"));
        assert_eq!(state.attributes["auto_suspend"], Value::Int(0));
        assert_eq!(diags.warnings().count(), 1);
    }
}
