use super::{comment, fully_qualified_name, object_name};
use crate::remote::ObjectKind;
use crate::schema::{AttributeDescriptor, Block, Constraint, ResourceSchema, Validator};

pub const TYPE_NAME: &str = "snowflake_compute_pool";
pub const PREVIEW_FEATURE: &str = "snowflake_compute_pool_resource";

pub const INSTANCE_FAMILIES: &[&str] = &[
    "CPU_X64_XS",
    "CPU_X64_S",
    "CPU_X64_M",
    "CPU_X64_L",
    "HIGHMEM_X64_S",
    "HIGHMEM_X64_M",
    "HIGHMEM_X64_L",
    "GPU_NV_S",
    "GPU_NV_M",
    "GPU_NV_L",
];

/// Compute pools cannot be renamed, so the name is structural.
pub fn schema() -> ResourceSchema {
    let attributes = vec![
        object_name().structural(),
        AttributeDescriptor::enumeration("instance_family", INSTANCE_FAMILIES)
            .required()
            .structural(),
        AttributeDescriptor::int("min_nodes")
            .required()
            .validate_with(Validator::at_least(1)),
        AttributeDescriptor::int("max_nodes")
            .required()
            .validate_with(Validator::at_least(1)),
        AttributeDescriptor::bool("auto_resume"),
        AttributeDescriptor::bool("initially_suspended").write_on_create(),
        AttributeDescriptor::int("auto_suspend_secs").validate_with(Validator::at_least(0)),
        comment(),
        fully_qualified_name(),
    ];

    ResourceSchema {
        type_name: TYPE_NAME,
        kind: ObjectKind::ComputePool,
        version: 1,
        description: "Snowpark Container Services compute pool",
        preview_feature: Some(PREVIEW_FEATURE),
        block: Block::new(attributes).with_constraint(Constraint::NotGreaterThan {
            lesser: "min_nodes",
            greater: "max_nodes",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Config;

    #[test]
    fn test_min_nodes_above_max_nodes() {
        let config = Config::new()
            .with("name", "P1")
            .with("instance_family", "CPU_X64_XS")
            .with("min_nodes", 3)
            .with("max_nodes", 1);
        let diags = schema().block.validate(&config);
        assert_eq!(diags.errors().count(), 1);
        assert_eq!(
            diags.iter().next().unwrap().path.as_ref().unwrap().to_string(),
            "min_nodes"
        );
    }
}
