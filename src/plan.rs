use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::identifier::Identifier;
use crate::remote::ParameterLevel;
use crate::value::{Attributes, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAction {
    Create,
    Update,
    /// Destroy followed by Create
    Replace,
    NoOp,
    Destroy,
}

impl fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceAction::Create => "create",
            ResourceAction::Update => "update",
            ResourceAction::Replace => "replace",
            ResourceAction::NoOp => "no-op",
            ResourceAction::Destroy => "destroy",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldAction {
    Create,
    Update,
    DestroyField,
    NoOp,
}

impl fmt::Display for FieldAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldAction::Create => "create",
            FieldAction::Update => "update",
            FieldAction::DestroyField => "destroy-field",
            FieldAction::NoOp => "no-op",
        };
        f.write_str(s)
    }
}

/// External change observed between the last apply and now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drift {
    pub recorded: Option<Value>,
    pub observed: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub attribute: String,
    pub action: FieldAction,
    /// Current remote value.
    pub before: Option<Value>,
    /// Predicted post-apply value; `None` with `defer_to_remote` means the
    /// remote decides.
    pub after: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift: Option<Drift>,
    #[serde(default)]
    pub defer_to_remote: bool,
    #[serde(default)]
    pub rename: bool,
    /// Level the parameter currently resolves at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<ParameterLevel>,
}

impl PlanEntry {
    pub fn new(attribute: &str, action: FieldAction) -> Self {
        Self {
            attribute: attribute.to_string(),
            action,
            before: None,
            after: None,
            drift: None,
            defer_to_remote: false,
            rename: false,
            level: None,
        }
    }

    pub fn is_change(&self) -> bool {
        self.action != FieldAction::NoOp
    }

    /// Whether applying this entry removes the value from the remote.
    pub fn is_unset(&self) -> bool {
        match self.action {
            FieldAction::DestroyField => true,
            FieldAction::Update => self.after.is_none(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub resource_type: String,
    pub action: ResourceAction,
    /// Identifier the instance has after apply.
    pub identifier: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_identifier: Option<Identifier>,
    /// Renames first, then descriptor order.
    pub entries: Vec<PlanEntry>,
    /// Attribute values known before apply.
    pub planned: Attributes,
    /// Attributes `Set` in configuration.
    pub configured: BTreeSet<String>,
    #[serde(default)]
    pub diagnostics: Diagnostics,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.action == ResourceAction::NoOp
    }

    pub fn entry(&self, attribute: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.attribute == attribute)
    }

    pub fn changes(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.is_change())
    }

    pub fn drifted(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.drift.is_some())
    }

    pub fn rename(&self) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.rename && e.is_change())
    }
}
