//! Resource and data-source catalogue.
//!
//! Types are split between the two backends the mux composes: the framework
//! backend speaks protocol v6 natively, the legacy backend still speaks v5.

pub mod account_parameter;
pub mod compute_pool;
pub mod data_sources;
pub mod masking_policy;
pub mod row_access_policy;
pub mod warehouse;

use crate::config::provider_block;
use crate::schema::{AttributeDescriptor, AttributeType, IdentityPart, Registry, Validator};

/// Types served by the native v6 backend.
pub fn framework_registry() -> Registry {
    Registry::new(provider_block())
        .with_resource(warehouse::schema())
        .with_resource(compute_pool::schema())
        .with_data_source(data_sources::compute_pools())
        .with_data_source(data_sources::warehouses())
}

/// Types served by the v5 backend behind the upgrade adapter.
pub fn legacy_registry() -> Registry {
    Registry::new(provider_block())
        .with_resource(masking_policy::schema())
        .with_resource(row_access_policy::schema())
        .with_resource(account_parameter::schema())
}

/// Every type in one registry, for tooling that does not go through the mux.
pub fn full_registry() -> Registry {
    let mut registry = framework_registry();
    for schema in legacy_registry().resources() {
        registry = registry.with_resource(schema.clone());
    }
    registry
}

fn object_name() -> AttributeDescriptor {
    AttributeDescriptor::string("name")
        .required()
        .identity(IdentityPart::Name)
        .validate_with(Validator::NotEmpty)
        .describe("Identifier of the object; must be unique within its container")
}

fn container(name: &'static str, part: IdentityPart) -> AttributeDescriptor {
    AttributeDescriptor::string(name)
        .required()
        .structural()
        .identity(part)
        .validate_with(Validator::NotEmpty)
}

fn fully_qualified_name() -> AttributeDescriptor {
    AttributeDescriptor::string("fully_qualified_name")
        .fully_qualified_name()
        .describe("Fully qualified name of the object")
}

fn comment() -> AttributeDescriptor {
    AttributeDescriptor::string("comment")
}

/// `argument` block of masking and row access policies.
fn policy_argument() -> AttributeDescriptor {
    AttributeDescriptor::new(
        "argument",
        AttributeType::ListOfRecord(vec![
            AttributeDescriptor::string("name")
                .required()
                .ignore_case()
                .validate_with(Validator::NotEmpty),
            AttributeDescriptor::string("type").required().ignore_case(),
        ]),
    )
    .required()
    .structural()
    .remote("signature")
    .validate_with(Validator::NotEmpty)
    .describe("Ordered policy signature; changing it recreates the policy")
}
