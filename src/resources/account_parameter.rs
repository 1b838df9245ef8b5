use crate::remote::ObjectKind;
use crate::schema::{AttributeDescriptor, Block, IdentityPart, ResourceSchema, Validator};

pub const TYPE_NAME: &str = "snowflake_account_parameter";

/// One account-level parameter managed as its own instance, keyed by the
/// parameter name. Destroying it unsets the parameter.
pub fn schema() -> ResourceSchema {
    let attributes = vec![
        AttributeDescriptor::string("key")
            .required()
            .structural()
            .identity(IdentityPart::Name)
            .validate_with(Validator::pattern(
                r"^[A-Z][A-Z0-9_]*$",
                "an upper-case parameter name",
            )),
        AttributeDescriptor::string("value").required(),
    ];

    ResourceSchema {
        type_name: TYPE_NAME,
        kind: ObjectKind::AccountParameter,
        version: 1,
        description: "Account-level parameter",
        preview_feature: None,
        block: Block::new(attributes),
    }
}
