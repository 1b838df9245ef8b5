//! Remote Client contract.
//!
//! The reconciliation core only ever talks to Snowflake through
//! [`RemoteClient`]. Concrete clients are produced by an injected
//! [`ClientFactory`] during Configure.

mod call;
mod error;
pub mod memory;
pub mod sql;
pub mod sql_api;

pub use call::{CallContext, CallPolicy};
pub use error::RemoteError;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::identifier::{Identifier, IdentifierKind};
use crate::value::{Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Warehouse,
    ComputePool,
    MaskingPolicy,
    RowAccessPolicy,
    AccountParameter,
}

impl ObjectKind {
    /// Object type as spelled in SQL (`CREATE <sql_name> ...`).
    pub fn sql_name(self) -> &'static str {
        match self {
            ObjectKind::Warehouse => "WAREHOUSE",
            ObjectKind::ComputePool => "COMPUTE POOL",
            ObjectKind::MaskingPolicy => "MASKING POLICY",
            ObjectKind::RowAccessPolicy => "ROW ACCESS POLICY",
            ObjectKind::AccountParameter => "PARAMETER",
        }
    }

    /// Plural used by SHOW.
    pub fn sql_plural(self) -> &'static str {
        match self {
            ObjectKind::Warehouse => "WAREHOUSES",
            ObjectKind::ComputePool => "COMPUTE POOLS",
            ObjectKind::MaskingPolicy => "MASKING POLICIES",
            ObjectKind::RowAccessPolicy => "ROW ACCESS POLICIES",
            ObjectKind::AccountParameter => "PARAMETERS",
        }
    }

    pub fn identifier_kind(self) -> IdentifierKind {
        match self {
            ObjectKind::Warehouse | ObjectKind::ComputePool | ObjectKind::AccountParameter => {
                IdentifierKind::Account
            }
            ObjectKind::MaskingPolicy | ObjectKind::RowAccessPolicy => IdentifierKind::Schema,
        }
    }

    /// Level name Snowflake reports for parameters set directly on this kind.
    pub fn parameter_level_name(self) -> &'static str {
        match self {
            ObjectKind::Warehouse => "WAREHOUSE",
            ObjectKind::ComputePool => "COMPUTE_POOL",
            ObjectKind::MaskingPolicy => "MASKING_POLICY",
            ObjectKind::RowAccessPolicy => "ROW_ACCESS_POLICY",
            ObjectKind::AccountParameter => "ACCOUNT",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Warehouse => "warehouse",
            ObjectKind::ComputePool => "compute pool",
            ObjectKind::MaskingPolicy => "masking policy",
            ObjectKind::RowAccessPolicy => "row access policy",
            ObjectKind::AccountParameter => "account parameter",
        };
        f.write_str(s)
    }
}

/// Container a SHOW command is restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowScope {
    #[default]
    Account,
    Database(String),
    Schema { database: String, schema: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub rows: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// Filters understood by SHOW: `LIKE`, `IN`, `STARTS WITH`, `LIMIT .. FROM`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowFilter {
    pub like: Option<String>,
    pub scope: ShowScope,
    pub starts_with: Option<String>,
    pub limit: Option<Limit>,
}

impl ShowFilter {
    /// Filter that selects exactly the object named by `identifier`.
    pub fn exact(identifier: &Identifier) -> Self {
        let scope = match (identifier.database_name(), identifier.schema_name()) {
            (Some(database), Some(schema)) => ShowScope::Schema {
                database: database.to_string(),
                schema: schema.to_string(),
            },
            (Some(database), None) => ShowScope::Database(database.to_string()),
            _ => ShowScope::Account,
        };
        Self {
            like: Some(escape_like(identifier.name())),
            scope,
            ..Self::default()
        }
    }
}

/// Escape LIKE wildcards so the pattern matches `name` literally.
pub fn escape_like(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// One row of a SHOW result, plus any DESCRIBE properties merged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub identifier: Identifier,
    pub properties: Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterScope {
    Account,
    Object {
        kind: ObjectKind,
        identifier: Identifier,
    },
}

/// Where the effective value of a parameter comes from, most general first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterLevel {
    Default,
    Account,
    Object,
}

impl fmt::Display for ParameterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParameterLevel::Default => "default",
            ParameterLevel::Account => "account",
            ParameterLevel::Object => "object",
        };
        f.write_str(s)
    }
}

/// Effective parameter value as reported by SHOW PARAMETERS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub key: String,
    pub value: Value,
    pub level: ParameterLevel,
    /// Value the parameter resolves to once the object-level override is removed.
    pub inherited: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub properties: Record,
    pub parameters: Record,
}

/// Property changes for one ALTER; unsets are applied before sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alteration {
    pub set: Record,
    pub unset: Vec<String>,
}

impl Alteration {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn show(
        &self,
        kind: ObjectKind,
        filter: &ShowFilter,
    ) -> Result<Vec<RemoteObject>, RemoteError>;

    /// DESCRIBE output for one object; `NotFound` when it does not exist.
    async fn describe(&self, kind: ObjectKind, id: &Identifier) -> Result<Record, RemoteError>;

    async fn create(
        &self,
        kind: ObjectKind,
        id: &Identifier,
        request: &CreateRequest,
    ) -> Result<(), RemoteError>;

    async fn alter(
        &self,
        kind: ObjectKind,
        id: &Identifier,
        alteration: &Alteration,
    ) -> Result<(), RemoteError>;

    async fn drop(&self, kind: ObjectKind, id: &Identifier) -> Result<(), RemoteError>;

    async fn rename(
        &self,
        kind: ObjectKind,
        from: &Identifier,
        to: &Identifier,
    ) -> Result<(), RemoteError>;

    async fn set_parameters(
        &self,
        scope: &ParameterScope,
        values: &Record,
    ) -> Result<(), RemoteError>;

    async fn unset_parameters(
        &self,
        scope: &ParameterScope,
        keys: &[String],
    ) -> Result<(), RemoteError>;

    async fn show_parameters(
        &self,
        scope: &ParameterScope,
    ) -> Result<Vec<ParameterValue>, RemoteError>;
}

/// Builds remote clients from resolved provider configuration.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, config: &ProviderConfig)
    -> Result<Arc<dyn RemoteClient>, ProviderError>;
}
