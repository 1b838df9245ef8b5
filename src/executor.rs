//! Realizes a [`Plan`] against the remote.
//!
//! Update order is fixed: rename, property unsets, parameter unsets,
//! property sets, parameter sets. After the last operation the object is
//! read back and every value the plan predicted must be observed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::identifier::Identifier;
use crate::plan::{Plan, ResourceAction};
use crate::remote::{
    Alteration, CallContext, CreateRequest, ParameterLevel, ParameterScope, RemoteClient,
};
use crate::schema::{ResourceSchema, Source};
use crate::snapshot::{self, RemoteSnapshot};
use crate::state::{InstanceState, PrivateState};
use crate::value::{Record, Value};

/// One remote operation the executor completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Create { identifier: Identifier },
    Drop { identifier: Identifier },
    Rename { from: Identifier, to: Identifier },
    Unset { keys: Vec<String> },
    UnsetParameters { keys: Vec<String> },
    Set { keys: Vec<String> },
    SetParameters { keys: Vec<String> },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Create { identifier } => write!(f, "create {identifier}"),
            Step::Drop { identifier } => write!(f, "drop {identifier}"),
            Step::Rename { from, to } => write!(f, "rename {from} to {to}"),
            Step::Unset { keys } => write!(f, "unset {}", keys.join(", ")),
            Step::UnsetParameters { keys } => write!(f, "unset parameters {}", keys.join(", ")),
            Step::Set { keys } => write!(f, "set {}", keys.join(", ")),
            Step::SetParameters { keys } => write!(f, "set parameters {}", keys.join(", ")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// State to persist; `None` once the instance is destroyed.
    pub state: Option<InstanceState>,
    pub completed: Vec<Step>,
    pub diagnostics: Diagnostics,
}

impl ApplyOutcome {
    pub fn is_success(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

pub struct Executor<'a> {
    schema: &'a ResourceSchema,
    client: &'a dyn RemoteClient,
    ctx: &'a CallContext,
}

impl<'a> Executor<'a> {
    pub fn new(
        schema: &'a ResourceSchema,
        client: &'a dyn RemoteClient,
        ctx: &'a CallContext,
    ) -> Self {
        Self {
            schema,
            client,
            ctx,
        }
    }

    /// Apply `plan` on top of `prior`.
    ///
    /// On failure the returned state is `prior` as last successfully
    /// applied; a rename that already went through is kept so the state
    /// still points at the live object.
    pub async fn apply(&self, prior: Option<&InstanceState>, plan: &Plan) -> ApplyOutcome {
        let mut completed = Vec::new();
        match self.run(plan, &mut completed).await {
            Ok(state) => {
                tracing::info!(
                    resource_type = self.schema.type_name,
                    identifier = %plan.identifier,
                    action = %plan.action,
                    steps = completed.len(),
                    "apply complete"
                );
                ApplyOutcome {
                    state,
                    completed,
                    diagnostics: Diagnostics::new(),
                }
            }
            Err(err) => {
                tracing::warn!(
                    resource_type = self.schema.type_name,
                    identifier = %plan.identifier,
                    error = %err,
                    completed = completed.len(),
                    "apply failed"
                );
                let state = self.fallback(prior, plan, &completed);
                let mut diagnostics = err.into_diagnostics();
                if !completed.is_empty() {
                    let steps: Vec<String> = completed.iter().map(Step::to_string).collect();
                    diagnostics.push(
                        Diagnostic::warning(format!(
                            "apply stopped after {} completed operation(s)",
                            completed.len()
                        ))
                        .with_detail(steps.join("; ")),
                    );
                }
                ApplyOutcome {
                    state,
                    completed,
                    diagnostics,
                }
            }
        }
    }

    async fn run(
        &self,
        plan: &Plan,
        completed: &mut Vec<Step>,
    ) -> Result<Option<InstanceState>, ProviderError> {
        if plan.resource_type != self.schema.type_name {
            return Err(ProviderError::internal(
                "plan-resource-type",
                format!(
                    "plan for {} applied as {}",
                    plan.resource_type, self.schema.type_name
                ),
            ));
        }

        match plan.action {
            ResourceAction::Destroy => {
                self.drop_object(&plan.identifier, completed).await?;
                return Ok(None);
            }
            ResourceAction::Create => self.create(plan, completed).await?,
            ResourceAction::Replace => {
                let prior = prior_identifier(plan)?;
                self.drop_object(prior, completed).await?;
                self.create(plan, completed).await?;
            }
            ResourceAction::Update => self.update(plan, completed).await?,
            ResourceAction::NoOp => {}
        }

        let snapshot = snapshot::read(self.client, self.ctx, self.schema, &plan.identifier)
            .await?
            .ok_or_else(|| {
                ProviderError::internal(
                    "post-apply-read",
                    format!("{} {} not found after apply", self.schema.kind, plan.identifier),
                )
            })?;
        self.verify(plan, &snapshot)?;
        Ok(Some(self.canonical(plan, &snapshot)))
    }

    async fn drop_object(
        &self,
        identifier: &Identifier,
        completed: &mut Vec<Step>,
    ) -> Result<(), ProviderError> {
        let kind = self.schema.kind;
        match self
            .ctx
            .mutate("drop", false, || self.client.drop(kind, identifier))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(identifier = %identifier, "object already gone");
            }
            Err(e) => return Err(e.into()),
        }
        completed.push(Step::Drop {
            identifier: identifier.clone(),
        });
        Ok(())
    }

    async fn create(&self, plan: &Plan, completed: &mut Vec<Step>) -> Result<(), ProviderError> {
        let mut request = CreateRequest::default();
        for attr in self.schema.attributes() {
            if !plan.configured.contains(attr.name) {
                continue;
            }
            let Some(value) = plan.planned.get(attr.name) else {
                continue;
            };
            match attr.source {
                Source::Property(key) | Source::CreateOnly(key) => {
                    request.properties.insert(key.to_string(), value.clone());
                }
                Source::Parameter(key) => {
                    request.parameters.insert(key.to_string(), value.clone());
                }
                _ => {}
            }
        }

        let kind = self.schema.kind;
        self.ctx
            .mutate("create", false, || {
                self.client.create(kind, &plan.identifier, &request)
            })
            .await?;
        completed.push(Step::Create {
            identifier: plan.identifier.clone(),
        });
        Ok(())
    }

    async fn update(&self, plan: &Plan, completed: &mut Vec<Step>) -> Result<(), ProviderError> {
        let kind = self.schema.kind;
        let mut current = prior_identifier(plan)?.clone();

        if plan.rename().is_some() && current != plan.identifier {
            let target = plan.identifier.clone();
            self.ctx
                .mutate("rename", false, || self.client.rename(kind, &current, &target))
                .await?;
            completed.push(Step::Rename {
                from: current,
                to: target.clone(),
            });
            current = target;
        }

        let mut unset = Vec::new();
        let mut unset_parameters = Vec::new();
        let mut set = Record::new();
        let mut set_parameters = Record::new();

        for entry in plan.changes().filter(|e| !e.rename) {
            let attr = self.schema.attribute(&entry.attribute).ok_or_else(|| {
                ProviderError::internal(
                    "plan-attribute",
                    format!("{} has no attribute \"{}\"", self.schema.type_name, entry.attribute),
                )
            })?;
            match (&attr.source, entry.is_unset(), &entry.after) {
                (Source::Property(key), true, _) => unset.push(key.to_string()),
                (Source::Parameter(key), true, _) => unset_parameters.push(key.to_string()),
                (Source::Property(key), false, Some(value)) => {
                    set.insert(key.to_string(), value.clone());
                }
                (Source::Parameter(key), false, Some(value)) => {
                    set_parameters.insert(key.to_string(), value.clone());
                }
                _ => {
                    return Err(ProviderError::internal(
                        "plan-attribute",
                        format!("\"{}\" cannot be changed in place", entry.attribute),
                    ));
                }
            }
        }

        let scope = ParameterScope::Object {
            kind,
            identifier: current.clone(),
        };

        if !unset.is_empty() {
            let alteration = Alteration {
                set: Record::new(),
                unset: unset.clone(),
            };
            self.ctx
                .mutate("alter", true, || self.client.alter(kind, &current, &alteration))
                .await?;
            completed.push(Step::Unset { keys: unset });
        }
        if !unset_parameters.is_empty() {
            self.ctx
                .mutate("unset_parameters", true, || {
                    self.client.unset_parameters(&scope, &unset_parameters)
                })
                .await?;
            completed.push(Step::UnsetParameters {
                keys: unset_parameters,
            });
        }
        if !set.is_empty() {
            let keys = set.keys().cloned().collect();
            let alteration = Alteration {
                set,
                unset: Vec::new(),
            };
            self.ctx
                .mutate("alter", true, || self.client.alter(kind, &current, &alteration))
                .await?;
            completed.push(Step::Set { keys });
        }
        if !set_parameters.is_empty() {
            self.ctx
                .mutate("set_parameters", true, || {
                    self.client.set_parameters(&scope, &set_parameters)
                })
                .await?;
            completed.push(Step::SetParameters {
                keys: set_parameters.into_keys().collect(),
            });
        }
        Ok(())
    }

    fn verify(&self, plan: &Plan, snapshot: &RemoteSnapshot) -> Result<(), ProviderError> {
        for entry in &plan.entries {
            if entry.defer_to_remote {
                continue;
            }
            let Some(expected) = &entry.after else {
                continue;
            };
            let Some(attr) = self.schema.attribute(&entry.attribute) else {
                continue;
            };
            if matches!(attr.source, Source::CreateOnly(_) | Source::None) {
                continue;
            }
            let observed = snapshot.value_of(self.schema, attr);
            if !attr.optional_values_equal(Some(expected), observed.as_ref()) {
                return Err(ProviderError::internal(
                    "post-apply-consistency",
                    format!(
                        "\"{}\" was planned as {expected} but the remote reports {}",
                        entry.attribute,
                        observed.map_or_else(|| "null".to_string(), |v| v.to_string())
                    ),
                ));
            }
            if let Source::Parameter(key) = attr.source {
                let level = snapshot.parameter(key).map(|p| p.level);
                if plan.configured.contains(attr.name) && level != Some(ParameterLevel::Object) {
                    return Err(ProviderError::internal(
                        "post-apply-consistency",
                        format!("\"{}\" is not set on the object itself", entry.attribute),
                    ));
                }
            }
        }
        Ok(())
    }

    fn canonical(&self, plan: &Plan, snapshot: &RemoteSnapshot) -> InstanceState {
        InstanceState {
            schema_version: self.schema.version,
            identifier: snapshot.identifier.clone(),
            attributes: snapshot.settle(self.schema, &plan.planned),
            show_output: snapshot.show_output.clone(),
            parameters: snapshot.parameters.clone(),
            private: PrivateState {
                configured: plan.configured.clone(),
            },
        }
    }

    /// State to keep after a failed apply.
    fn fallback(
        &self,
        prior: Option<&InstanceState>,
        plan: &Plan,
        completed: &[Step],
    ) -> Option<InstanceState> {
        let created = completed.iter().any(|s| matches!(s, Step::Create { .. }));
        if created {
            // The object exists now even though it could not be read back.
            return Some(InstanceState {
                schema_version: self.schema.version,
                identifier: plan.identifier.clone(),
                attributes: plan.planned.clone(),
                show_output: Record::new(),
                parameters: Vec::new(),
                private: PrivateState {
                    configured: plan.configured.clone(),
                },
            });
        }

        // Replace failed between drop and create: nothing remains remotely.
        if completed.iter().any(|s| matches!(s, Step::Drop { .. })) {
            return None;
        }

        let mut state = prior.cloned()?;
        let renamed_to = completed.iter().find_map(|s| match s {
            Step::Rename { to, .. } => Some(to.clone()),
            _ => None,
        });
        if let Some(to) = renamed_to {
            for attr in self.schema.attributes() {
                let value = match attr.source {
                    Source::Identity(part) => self.schema.identity_value(part, &to),
                    Source::FullyQualifiedName => Some(Value::from(to.fully_qualified_name())),
                    _ => continue,
                };
                if let Some(value) = value {
                    state.attributes.insert(attr.name.to_string(), value);
                }
            }
            state.identifier = to;
        }
        Some(state)
    }
}

fn prior_identifier(plan: &Plan) -> Result<&Identifier, ProviderError> {
    plan.prior_identifier.as_ref().ok_or_else(|| {
        ProviderError::internal(
            "plan-prior-identifier",
            format!("{} plan for {} lacks a prior identifier", plan.action, plan.identifier),
        )
    })
}
