use super::{comment, fully_qualified_name, object_name};
use crate::remote::ObjectKind;
use crate::schema::{AttributeDescriptor, Block, Constraint, ResourceSchema, Validator};

pub const TYPE_NAME: &str = "snowflake_warehouse";

pub const WAREHOUSE_TYPES: &[&str] = &["STANDARD", "SNOWPARK-OPTIMIZED"];

pub const WAREHOUSE_SIZES: &[&str] = &[
    "XSMALL", "SMALL", "MEDIUM", "LARGE", "XLARGE", "XXLARGE", "XXXLARGE", "X4LARGE", "X5LARGE",
    "X6LARGE",
];

pub const SCALING_POLICIES: &[&str] = &["STANDARD", "ECONOMY"];

pub const RESOURCE_CONSTRAINTS: &[&str] = &[
    "MEMORY_1X",
    "MEMORY_1X_X86",
    "MEMORY_16X",
    "MEMORY_16X_X86",
    "MEMORY_64X",
    "MEMORY_64X_X86",
    "STANDARD_GEN_1",
    "STANDARD_GEN_2",
];

pub fn schema() -> ResourceSchema {
    let attributes = vec![
        object_name().renamable(),
        AttributeDescriptor::enumeration("warehouse_type", WAREHOUSE_TYPES),
        AttributeDescriptor::enumeration("warehouse_size", WAREHOUSE_SIZES),
        AttributeDescriptor::int("max_cluster_count").validate_with(Validator::between(1, 10)),
        AttributeDescriptor::int("min_cluster_count").validate_with(Validator::between(1, 10)),
        AttributeDescriptor::enumeration("scaling_policy", SCALING_POLICIES),
        AttributeDescriptor::int("auto_suspend")
            .validate_with(Validator::at_least(0))
            .describe("Seconds of inactivity before suspension; 0 disables it"),
        AttributeDescriptor::bool("auto_resume"),
        AttributeDescriptor::bool("initially_suspended")
            .write_on_create()
            .describe("Only honoured when the warehouse is created"),
        AttributeDescriptor::string("resource_monitor"),
        comment(),
        AttributeDescriptor::bool("enable_query_acceleration"),
        AttributeDescriptor::int("query_acceleration_max_scale_factor")
            .validate_with(Validator::between(0, 100)),
        AttributeDescriptor::enumeration("resource_constraint", RESOURCE_CONSTRAINTS),
        AttributeDescriptor::int("max_concurrency_level")
            .parameter("MAX_CONCURRENCY_LEVEL")
            .validate_with(Validator::at_least(1)),
        AttributeDescriptor::int("statement_queued_timeout_in_seconds")
            .parameter("STATEMENT_QUEUED_TIMEOUT_IN_SECONDS")
            .validate_with(Validator::at_least(0)),
        AttributeDescriptor::int("statement_timeout_in_seconds")
            .parameter("STATEMENT_TIMEOUT_IN_SECONDS")
            .validate_with(Validator::between(0, 604_800)),
        fully_qualified_name(),
    ];

    ResourceSchema {
        type_name: TYPE_NAME,
        kind: ObjectKind::Warehouse,
        version: 1,
        description: "Virtual warehouse",
        preview_feature: None,
        block: Block::new(attributes)
            .with_constraint(Constraint::NotGreaterThan {
                lesser: "min_cluster_count",
                greater: "max_cluster_count",
            })
            .with_constraint(Constraint::RequiredWith {
                attribute: "query_acceleration_max_scale_factor",
                requires: "enable_query_acceleration",
            }),
    }
}
