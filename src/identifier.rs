//! Fully-qualified object identifiers.
//!
//! Identifiers are compared on their raw form, so `W1` and `"W1"` are
//! different identifiers even though Snowflake may resolve them to the same
//! object.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator used by import keys, e.g. `DB|SCHEMA|POLICY`.
pub const IMPORT_DELIMITER: char = '|';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("identifier '{input}' has {found} part(s), expected {expected} for a {kind} identifier")]
    WrongPartCount {
        input: String,
        kind: IdentifierKind,
        expected: usize,
        found: usize,
    },

    #[error("identifier '{input}' contains an empty part")]
    EmptyPart { input: String },

    #[error("identifier part '{part}' contains the reserved delimiter '|'")]
    ReservedDelimiter { part: String },
}

/// Scoping of an identifier: how many name parts it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Account,
    Database,
    Schema,
}

impl IdentifierKind {
    pub fn part_count(self) -> usize {
        match self {
            IdentifierKind::Account => 1,
            IdentifierKind::Database => 2,
            IdentifierKind::Schema => 3,
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IdentifierKind::Account => "account object",
            IdentifierKind::Database => "database object",
            IdentifierKind::Schema => "schema object",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identifier {
    Account {
        name: String,
    },
    Database {
        database: String,
        name: String,
    },
    Schema {
        database: String,
        schema: String,
        name: String,
    },
}

impl Identifier {
    pub fn account(name: impl Into<String>) -> Self {
        Identifier::Account { name: name.into() }
    }

    pub fn database(database: impl Into<String>, name: impl Into<String>) -> Self {
        Identifier::Database {
            database: database.into(),
            name: name.into(),
        }
    }

    pub fn schema(
        database: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Identifier::Schema {
            database: database.into(),
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Build an identifier of `kind` from its parts in declaration order.
    pub fn from_parts(kind: IdentifierKind, parts: &[&str]) -> Result<Self, IdentifierError> {
        let input = parts.join(".");
        if parts.len() != kind.part_count() {
            return Err(IdentifierError::WrongPartCount {
                input,
                kind,
                expected: kind.part_count(),
                found: parts.len(),
            });
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(IdentifierError::EmptyPart { input });
        }
        if let Some(part) = parts.iter().find(|p| p.contains(IMPORT_DELIMITER)) {
            return Err(IdentifierError::ReservedDelimiter {
                part: part.to_string(),
            });
        }
        Ok(match kind {
            IdentifierKind::Account => Identifier::account(parts[0]),
            IdentifierKind::Database => Identifier::database(parts[0], parts[1]),
            IdentifierKind::Schema => Identifier::schema(parts[0], parts[1], parts[2]),
        })
    }

    pub fn kind(&self) -> IdentifierKind {
        match self {
            Identifier::Account { .. } => IdentifierKind::Account,
            Identifier::Database { .. } => IdentifierKind::Database,
            Identifier::Schema { .. } => IdentifierKind::Schema,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Identifier::Account { name }
            | Identifier::Database { name, .. }
            | Identifier::Schema { name, .. } => name,
        }
    }

    pub fn database_name(&self) -> Option<&str> {
        match self {
            Identifier::Account { .. } => None,
            Identifier::Database { database, .. } | Identifier::Schema { database, .. } => {
                Some(database)
            }
        }
    }

    pub fn schema_name(&self) -> Option<&str> {
        match self {
            Identifier::Schema { schema, .. } => Some(schema),
            _ => None,
        }
    }

    pub fn parts(&self) -> Vec<&str> {
        match self {
            Identifier::Account { name } => vec![name],
            Identifier::Database { database, name } => vec![database, name],
            Identifier::Schema {
                database,
                schema,
                name,
            } => vec![database, schema, name],
        }
    }

    /// Same container, different object name.
    pub fn with_name(&self, new_name: impl Into<String>) -> Self {
        let mut renamed = self.clone();
        match &mut renamed {
            Identifier::Account { name }
            | Identifier::Database { name, .. }
            | Identifier::Schema { name, .. } => *name = new_name.into(),
        }
        renamed
    }

    /// Dotted, quoted form used in SQL, e.g. `"DB"."SCHEMA"."POLICY"`.
    pub fn fully_qualified_name(&self) -> String {
        self.parts()
            .iter()
            .map(|p| quote(p))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Pipe-delimited import key; `decode` reverses it byte for byte.
    pub fn encode(&self) -> String {
        self.parts().join(&IMPORT_DELIMITER.to_string())
    }

    pub fn decode(kind: IdentifierKind, input: &str) -> Result<Self, IdentifierError> {
        let parts: Vec<&str> = input.split(IMPORT_DELIMITER).collect();
        if parts.len() != kind.part_count() {
            return Err(IdentifierError::WrongPartCount {
                input: input.to_string(),
                kind,
                expected: kind.part_count(),
                found: parts.len(),
            });
        }
        Self::from_parts(kind, &parts)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fully_qualified_name())
    }
}

fn quote(part: &str) -> String {
    format!("\"{}\"", part.replace('"', "\"\""))
}
