use crate::remote::ObjectKind;
use crate::schema::{AttributeDescriptor, AttributeType, Block, DataSourceSchema, Validator};

pub const COMPUTE_POOLS: &str = "snowflake_compute_pools";
pub const COMPUTE_POOLS_PREVIEW_FEATURE: &str = "snowflake_compute_pools_datasource";
pub const WAREHOUSES: &str = "snowflake_warehouses";

fn like() -> AttributeDescriptor {
    AttributeDescriptor::string("like")
        .host_only()
        .describe("Case-insensitive SQL LIKE pattern (% and _ wildcards)")
}

fn output(name: &'static str) -> AttributeDescriptor {
    AttributeDescriptor::new(name, AttributeType::ListOfRecord(Vec::new()))
        .computed()
        .host_only()
}

pub fn compute_pools() -> DataSourceSchema {
    let limit = AttributeDescriptor::new(
        "limit",
        AttributeType::ListOfRecord(vec![
            AttributeDescriptor::int("rows")
                .required()
                .validate_with(Validator::at_least(1)),
            AttributeDescriptor::string("from"),
        ]),
    )
    .host_only()
    .validate_with(Validator::MaxItems(1))
    .describe("Limits rows returned; `from` starts after the first name matching it");

    DataSourceSchema {
        type_name: COMPUTE_POOLS,
        kind: ObjectKind::ComputePool,
        description: "Lists compute pools visible to the current role",
        preview_feature: Some(COMPUTE_POOLS_PREVIEW_FEATURE),
        block: Block::new(vec![
            like(),
            AttributeDescriptor::string("starts_with")
                .host_only()
                .describe("Case-sensitive name prefix"),
            limit,
            output("compute_pools"),
        ]),
        output: "compute_pools",
    }
}

pub fn warehouses() -> DataSourceSchema {
    DataSourceSchema {
        type_name: WAREHOUSES,
        kind: ObjectKind::Warehouse,
        description: "Lists warehouses visible to the current role",
        preview_feature: None,
        block: Block::new(vec![like(), output("warehouses")]),
        output: "warehouses",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Config, Record, Value};

    fn limit(rows: i64, from: Option<&str>) -> Value {
        let mut r = Record::new();
        r.insert("rows".to_string(), Value::Int(rows));
        if let Some(from) = from {
            r.insert("from".to_string(), Value::from(from));
        }
        Value::List(vec![Value::Record(r)])
    }

    #[test]
    fn test_limit_block_is_validated() {
        let schema = compute_pools();
        let ok = Config::new().with("limit", limit(1, Some("P")));
        assert!(schema.block.validate(&ok).is_empty());

        let bad = Config::new().with("limit", limit(0, None));
        let diags = schema.block.validate(&bad);
        assert_eq!(
            diags.iter().next().unwrap().path.as_ref().unwrap().to_string(),
            "limit[0].rows"
        );
    }

    #[test]
    fn test_output_cannot_be_configured() {
        let config = Config::new().with("warehouses", Value::List(Vec::new()));
        assert!(warehouses().block.validate(&config).has_errors());
    }
}
