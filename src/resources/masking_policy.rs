use super::{comment, container, fully_qualified_name, object_name, policy_argument};
use crate::remote::ObjectKind;
use crate::schema::{AttributeDescriptor, Block, IdentityPart, ResourceSchema, Validator};

pub const TYPE_NAME: &str = "snowflake_masking_policy";

pub fn schema() -> ResourceSchema {
    let attributes = vec![
        container("database", IdentityPart::Database),
        container("schema", IdentityPart::Schema),
        object_name().renamable(),
        policy_argument(),
        AttributeDescriptor::string("body")
            .required()
            .validate_with(Validator::NotEmpty)
            .describe("SQL expression that transforms the data"),
        AttributeDescriptor::string("return_data_type")
            .required()
            .structural()
            .ignore_case(),
        AttributeDescriptor::bool("exempt_other_policies").structural(),
        comment(),
        fully_qualified_name(),
    ];

    ResourceSchema {
        type_name: TYPE_NAME,
        kind: ObjectKind::MaskingPolicy,
        version: 1,
        description: "Column masking policy",
        preview_feature: None,
        block: Block::new(attributes),
    }
}
