use super::{comment, container, fully_qualified_name, object_name, policy_argument};
use crate::remote::ObjectKind;
use crate::schema::{AttributeDescriptor, Block, IdentityPart, ResourceSchema, Validator};

pub const TYPE_NAME: &str = "snowflake_row_access_policy";

pub fn schema() -> ResourceSchema {
    let attributes = vec![
        container("database", IdentityPart::Database),
        container("schema", IdentityPart::Schema),
        object_name().renamable(),
        policy_argument(),
        AttributeDescriptor::string("body")
            .required()
            .validate_with(Validator::NotEmpty),
        comment(),
        fully_qualified_name(),
    ];

    ResourceSchema {
        type_name: TYPE_NAME,
        kind: ObjectKind::RowAccessPolicy,
        version: 1,
        description: "Row access policy",
        preview_feature: None,
        block: Block::new(attributes),
    }
}
