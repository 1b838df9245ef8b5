//! SQL text for every remote operation, and decoding of statement results.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{
    Alteration, CreateRequest, ObjectKind, ParameterLevel, ParameterScope, ParameterValue,
    RemoteError, RemoteObject, ShowFilter, ShowScope,
};
use crate::identifier::Identifier;
use crate::value::{Record, Value};

/// Single-quoted string literal.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

fn quote_identifier(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub fn literal(value: &Value) -> String {
    match value {
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::String(s) => quote_literal(s),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(literal).collect();
            format!("({})", items.join(", "))
        }
        Value::Record(record) => {
            let fields: Vec<String> = record
                .iter()
                .map(|(k, v)| format!("{} = {}", k.to_uppercase(), literal(v)))
                .collect();
            format!("({})", fields.join(" "))
        }
    }
}

/// `(name type, ...)` for a policy signature.
fn signature(value: &Value) -> String {
    let args: Vec<String> = value
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_record)
        .map(|arg| {
            let name = arg.get("name").and_then(Value::as_str).unwrap_or_default();
            let ty = arg.get("type").and_then(Value::as_str).unwrap_or_default();
            format!("{name} {ty}")
        })
        .collect();
    format!("({})", args.join(", "))
}

fn assignments(values: &Record) -> String {
    values
        .iter()
        .map(|(k, v)| format!("{} = {}", k.to_uppercase(), literal(v)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn object_target(kind: ObjectKind, id: &Identifier) -> String {
    format!("{} {}", kind.sql_name(), id.fully_qualified_name())
}

fn scope_target(scope: &ParameterScope) -> String {
    match scope {
        ParameterScope::Account => "ACCOUNT".to_string(),
        ParameterScope::Object { kind, identifier } => object_target(*kind, identifier),
    }
}

pub fn show(kind: ObjectKind, filter: &ShowFilter) -> String {
    let mut sql = format!("SHOW {}", kind.sql_plural());
    if let Some(like) = &filter.like {
        sql.push_str(&format!(" LIKE {}", quote_literal(like)));
    }
    match &filter.scope {
        ShowScope::Account => sql.push_str(" IN ACCOUNT"),
        ShowScope::Database(database) => {
            sql.push_str(&format!(" IN DATABASE {}", quote_identifier(database)));
        }
        ShowScope::Schema { database, schema } => sql.push_str(&format!(
            " IN SCHEMA {}.{}",
            quote_identifier(database),
            quote_identifier(schema)
        )),
    }
    if let Some(prefix) = &filter.starts_with {
        sql.push_str(&format!(" STARTS WITH {}", quote_literal(prefix)));
    }
    if let Some(limit) = &filter.limit {
        sql.push_str(&format!(" LIMIT {}", limit.rows));
        if let Some(from) = &limit.from {
            sql.push_str(&format!(" FROM {}", quote_literal(from)));
        }
    }
    sql
}

pub fn describe(kind: ObjectKind, id: &Identifier) -> String {
    match kind {
        ObjectKind::AccountParameter => show(kind, &ShowFilter::exact(id)),
        _ => format!("DESCRIBE {}", object_target(kind, id)),
    }
}

pub fn create(kind: ObjectKind, id: &Identifier, request: &CreateRequest) -> String {
    let props = &request.properties;
    match kind {
        ObjectKind::AccountParameter => {
            let value = props.get("value").map(literal).unwrap_or_default();
            format!("ALTER ACCOUNT SET {} = {value}", id.name())
        }
        ObjectKind::MaskingPolicy | ObjectKind::RowAccessPolicy => {
            let args = props.get("signature").map(signature).unwrap_or_default();
            let returns = match kind {
                ObjectKind::MaskingPolicy => props
                    .get("return_data_type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                _ => "BOOLEAN".to_string(),
            };
            let body = props.get("body").and_then(Value::as_str).unwrap_or_default();
            let mut sql = format!(
                "CREATE {} AS {args} RETURNS {returns} -> {body}",
                object_target(kind, id)
            );
            let rest: Record = props
                .iter()
                .filter(|(k, _)| !matches!(k.as_str(), "signature" | "return_data_type" | "body"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !rest.is_empty() {
                sql.push(' ');
                sql.push_str(&assignments(&rest));
            }
            sql
        }
        ObjectKind::Warehouse | ObjectKind::ComputePool => {
            let mut sql = format!("CREATE {}", object_target(kind, id));
            if !props.is_empty() {
                sql.push(' ');
                sql.push_str(&assignments(props));
            }
            if !request.parameters.is_empty() {
                sql.push(' ');
                sql.push_str(&assignments(&request.parameters));
            }
            sql
        }
    }
}

/// One statement per clause; unsets come first.
pub fn alter(kind: ObjectKind, id: &Identifier, alteration: &Alteration) -> Vec<String> {
    let mut statements = Vec::new();
    if kind == ObjectKind::AccountParameter {
        if let Some(value) = alteration.set.get("value") {
            statements.push(format!("ALTER ACCOUNT SET {} = {}", id.name(), literal(value)));
        }
        return statements;
    }

    let target = object_target(kind, id);
    if !alteration.unset.is_empty() {
        let keys: Vec<String> = alteration.unset.iter().map(|k| k.to_uppercase()).collect();
        statements.push(format!("ALTER {target} UNSET {}", keys.join(", ")));
    }
    let mut set = alteration.set.clone();
    if let Some(body) = set.remove("body") {
        let body = body.as_str().unwrap_or_default().to_string();
        statements.push(format!("ALTER {target} SET BODY -> {body}"));
    }
    if !set.is_empty() {
        statements.push(format!("ALTER {target} SET {}", assignments(&set)));
    }
    statements
}

pub fn drop(kind: ObjectKind, id: &Identifier) -> String {
    match kind {
        ObjectKind::AccountParameter => format!("ALTER ACCOUNT UNSET {}", id.name()),
        _ => format!("DROP {}", object_target(kind, id)),
    }
}

pub fn rename(kind: ObjectKind, from: &Identifier, to: &Identifier) -> String {
    format!(
        "ALTER {} RENAME TO {}",
        object_target(kind, from),
        to.fully_qualified_name()
    )
}

pub fn set_parameters(scope: &ParameterScope, values: &Record) -> String {
    format!("ALTER {} SET {}", scope_target(scope), assignments(values))
}

pub fn unset_parameters(scope: &ParameterScope, keys: &[String]) -> String {
    format!("ALTER {} UNSET {}", scope_target(scope), keys.join(", "))
}

pub fn show_parameters(scope: &ParameterScope) -> String {
    format!("SHOW PARAMETERS IN {}", scope_target(scope))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnType {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultSetMetaData {
    #[serde(rename = "rowType")]
    pub row_type: Vec<ColumnType>,
}

/// Body of a SQL API statement response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultSet {
    #[serde(rename = "resultSetMetaData")]
    pub meta: ResultSetMetaData,
    #[serde(default)]
    pub data: Vec<Vec<Option<String>>>,
}

pub type Row = BTreeMap<String, String>;

impl ResultSet {
    /// Rows keyed by lower-cased column name; SQL NULLs are left out.
    pub fn rows(&self) -> Vec<Row> {
        self.data
            .iter()
            .map(|row| {
                self.meta
                    .row_type
                    .iter()
                    .zip(row)
                    .filter_map(|(col, cell)| {
                        cell.as_ref().map(|v| (col.name.to_lowercase(), v.clone()))
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Text,
    Upper,
    Int,
    Bool,
    Size,
    Signature,
}

/// (result column, property key, decoding)
type ColumnMap = &'static [(&'static str, &'static str, Column)];

fn columns(kind: ObjectKind) -> ColumnMap {
    match kind {
        ObjectKind::Warehouse => &[
            ("type", "warehouse_type", Column::Upper),
            ("size", "warehouse_size", Column::Size),
            ("min_cluster_count", "min_cluster_count", Column::Int),
            ("max_cluster_count", "max_cluster_count", Column::Int),
            ("scaling_policy", "scaling_policy", Column::Upper),
            ("auto_suspend", "auto_suspend", Column::Int),
            ("auto_resume", "auto_resume", Column::Bool),
            ("resource_monitor", "resource_monitor", Column::Text),
            ("comment", "comment", Column::Text),
            ("enable_query_acceleration", "enable_query_acceleration", Column::Bool),
            (
                "query_acceleration_max_scale_factor",
                "query_acceleration_max_scale_factor",
                Column::Int,
            ),
            ("resource_constraint", "resource_constraint", Column::Upper),
            ("state", "state", Column::Text),
            ("owner", "owner", Column::Text),
        ],
        ObjectKind::ComputePool => &[
            ("instance_family", "instance_family", Column::Upper),
            ("min_nodes", "min_nodes", Column::Int),
            ("max_nodes", "max_nodes", Column::Int),
            ("auto_resume", "auto_resume", Column::Bool),
            ("auto_suspend_secs", "auto_suspend_secs", Column::Int),
            ("comment", "comment", Column::Text),
            ("state", "state", Column::Text),
            ("owner", "owner", Column::Text),
        ],
        ObjectKind::MaskingPolicy => &[
            ("signature", "signature", Column::Signature),
            ("return_type", "return_data_type", Column::Upper),
            ("body", "body", Column::Text),
            ("exempt_other_policies", "exempt_other_policies", Column::Bool),
            ("comment", "comment", Column::Text),
            ("owner", "owner", Column::Text),
        ],
        ObjectKind::RowAccessPolicy => &[
            ("signature", "signature", Column::Signature),
            ("body", "body", Column::Text),
            ("comment", "comment", Column::Text),
            ("owner", "owner", Column::Text),
        ],
        ObjectKind::AccountParameter => &[
            ("value", "value", Column::Text),
            ("default", "default", Column::Text),
            ("level", "level", Column::Text),
        ],
    }
}

/// Snowflake reports sizes as `X-Small`, `2X-Large`, ...; configuration
/// uses `XSMALL`, `XXLARGE`, `X4LARGE`.
pub fn normalize_warehouse_size(raw: &str) -> String {
    let upper = raw.to_uppercase().replace(['-', ' '], "");
    match upper.as_str() {
        "2XLARGE" => "XXLARGE".to_string(),
        "3XLARGE" => "XXXLARGE".to_string(),
        "4XLARGE" => "X4LARGE".to_string(),
        "5XLARGE" => "X5LARGE".to_string(),
        "6XLARGE" => "X6LARGE".to_string(),
        _ => upper,
    }
}

/// `(VAL VARCHAR, N NUMBER(38,0))` into `[{name, type}, ...]`.
pub fn parse_signature(raw: &str) -> Value {
    let inner = raw.trim().trim_start_matches('(').trim_end_matches(')');
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut parts = Vec::new();
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    parts.push(current);

    for part in parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        let (name, ty) = part.split_once(char::is_whitespace).unwrap_or((part, ""));
        let mut arg = Record::new();
        arg.insert("name".to_string(), Value::from(name.trim()));
        arg.insert("type".to_string(), Value::from(ty.trim().to_uppercase()));
        args.push(Value::Record(arg));
    }
    Value::List(args)
}

fn decode_cell(column: Column, raw: &str) -> Result<Option<Value>, RemoteError> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    let value = match column {
        Column::Text => Value::from(raw),
        Column::Upper => Value::from(raw.to_uppercase()),
        Column::Size => Value::from(normalize_warehouse_size(raw)),
        Column::Int => Value::Int(raw.parse().map_err(|_| RemoteError::Decode {
            message: format!("expected a number, got '{raw}'"),
        })?),
        Column::Bool => Value::Bool(raw.eq_ignore_ascii_case("true")),
        Column::Signature => parse_signature(raw),
    };
    Ok(Some(value))
}

/// Project a SHOW or DESCRIBE row onto property keys.
pub fn decode_properties(kind: ObjectKind, row: &Row) -> Result<Record, RemoteError> {
    let mut record = Record::new();
    for (column, key, decoding) in columns(kind) {
        if let Some(raw) = row.get(*column)
            && let Some(value) = decode_cell(*decoding, raw)?
        {
            record.insert(key.to_string(), value);
        }
    }
    Ok(record)
}

/// DESCRIBE of a policy returns one row; DESCRIBE of a warehouse returns
/// `property`/`value` pairs.
pub fn decode_describe(kind: ObjectKind, rows: &[Row]) -> Result<Record, RemoteError> {
    if rows.iter().all(|r| r.contains_key("property")) {
        let pivoted: Row = rows
            .iter()
            .filter_map(|r| {
                let key = r.get("property")?.to_lowercase();
                let value = r.get("value").or_else(|| r.get("property_value"))?;
                Some((key, value.clone()))
            })
            .collect();
        return decode_properties(kind, &pivoted);
    }
    match rows.first() {
        Some(row) => decode_properties(kind, row),
        None => Ok(Record::new()),
    }
}

pub fn decode_object(
    kind: ObjectKind,
    row: &Row,
    scope: &ShowScope,
) -> Result<RemoteObject, RemoteError> {
    let name_column = match kind {
        ObjectKind::AccountParameter => "key",
        _ => "name",
    };
    let name = row.get(name_column).ok_or_else(|| RemoteError::Decode {
        message: format!("SHOW {} row without {name_column}", kind.sql_plural()),
    })?;
    let identifier = match kind.identifier_kind() {
        crate::identifier::IdentifierKind::Schema => {
            let (database, schema) = match (row.get("database_name"), row.get("schema_name"), scope)
            {
                (Some(d), Some(s), _) => (d.clone(), s.clone()),
                (_, _, ShowScope::Schema { database, schema }) => {
                    (database.clone(), schema.clone())
                }
                _ => {
                    return Err(RemoteError::Decode {
                        message: format!("{name} lacks database_name or schema_name"),
                    });
                }
            };
            Identifier::schema(database, schema, name.clone())
        }
        crate::identifier::IdentifierKind::Database => {
            let database = row.get("database_name").cloned().unwrap_or_default();
            Identifier::database(database, name.clone())
        }
        crate::identifier::IdentifierKind::Account => Identifier::account(name.clone()),
    };
    Ok(RemoteObject {
        identifier,
        properties: decode_properties(kind, row)?,
    })
}

pub fn parameter_level(raw: &str) -> ParameterLevel {
    match raw.to_uppercase().as_str() {
        "" => ParameterLevel::Default,
        "ACCOUNT" => ParameterLevel::Account,
        _ => ParameterLevel::Object,
    }
}

fn parameter_value(ty: Option<&String>, raw: &str) -> Value {
    match ty.map(|t| t.to_uppercase()).as_deref() {
        Some("NUMBER") => raw.parse().map(Value::Int).unwrap_or_else(|_| Value::from(raw)),
        Some("BOOLEAN") => Value::Bool(raw.eq_ignore_ascii_case("true")),
        _ => Value::from(raw),
    }
}

/// One SHOW PARAMETERS row. `inherited` is the built-in default here; the
/// caller overlays account-level overrides.
pub fn decode_parameter(row: &Row) -> Result<ParameterValue, RemoteError> {
    let key = row.get("key").ok_or_else(|| RemoteError::Decode {
        message: "SHOW PARAMETERS row without key".to_string(),
    })?;
    let ty = row.get("type");
    let value = row.get("value").map(String::as_str).unwrap_or_default();
    let default = row.get("default").map(String::as_str).unwrap_or_default();
    Ok(ParameterValue {
        key: key.clone(),
        value: parameter_value(ty, value),
        level: parameter_level(row.get("level").map(String::as_str).unwrap_or_default()),
        inherited: parameter_value(ty, default),
    })
}
