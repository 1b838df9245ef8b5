//! Last-known instance state.
//!
//! The host owns persistence; the engine only produces and consumes these
//! typed values. [`MemoryStateStore`] plays the host's part for the CLI and
//! the lifecycle tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::identifier::Identifier;
use crate::remote::ParameterValue;
use crate::value::{Attributes, Record, Value};

/// Provider-private bookkeeping carried alongside the attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateState {
    /// Attributes that were `Set` in configuration at the last apply.
    #[serde(default)]
    pub configured: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    pub schema_version: u64,
    pub identifier: Identifier,
    pub attributes: Attributes,
    /// SHOW row observed at the last read.
    #[serde(default)]
    pub show_output: Record,
    /// Parameter values with the level they were resolved at.
    #[serde(default)]
    pub parameters: Vec<ParameterValue>,
    #[serde(default)]
    pub private: PrivateState,
}

impl InstanceState {
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn parameter(&self, key: &str) -> Option<&ParameterValue> {
        self.parameters.iter().find(|p| p.key == key)
    }

    pub fn was_configured(&self, name: &str) -> bool {
        self.private.configured.contains(name)
    }

    pub fn to_json(&self) -> Result<String, ProviderError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ProviderError::internal("state-encoding", e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(raw)
            .map_err(|e| ProviderError::Protocol(format!("invalid instance state: {e}")))
    }
}

/// Host-side persistence of instance states, keyed by resource type and
/// identifier.
pub trait StateStore: Send + Sync {
    fn get(&self, type_name: &str, identifier: &Identifier) -> Option<InstanceState>;

    /// Replace the entry at `previous` with `next` in one step.
    ///
    /// `next == None` removes the entry; a `next` with a different
    /// identifier rekeys it.
    fn commit(&self, type_name: &str, previous: Option<&Identifier>, next: Option<InstanceState>);

    fn list(&self, type_name: &str) -> Vec<InstanceState>;
}

type StateKey = (String, Identifier);

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<BTreeMap<StateKey, InstanceState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    // A panic elsewhere never leaves a half-written map: every mutation is
    // a single insert or remove.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<StateKey, InstanceState>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<StateKey, InstanceState>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, type_name: &str, identifier: &Identifier) -> Option<InstanceState> {
        self.read()
            .get(&(type_name.to_string(), identifier.clone()))
            .cloned()
    }

    fn commit(&self, type_name: &str, previous: Option<&Identifier>, next: Option<InstanceState>) {
        let mut entries = self.write();
        if let Some(previous) = previous {
            entries.remove(&(type_name.to_string(), previous.clone()));
        }
        if let Some(next) = next {
            entries.insert((type_name.to_string(), next.identifier.clone()), next);
        }
    }

    fn list(&self, type_name: &str) -> Vec<InstanceState> {
        self.read()
            .iter()
            .filter(|((t, _), _)| t == type_name)
            .map(|(_, state)| state.clone())
            .collect()
    }
}
