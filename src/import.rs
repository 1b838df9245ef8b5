use crate::error::ProviderError;
use crate::identifier::Identifier;
use crate::remote::{CallContext, RemoteClient};
use crate::schema::ResourceSchema;
use crate::snapshot;
use crate::state::{InstanceState, PrivateState};

/// Adopt an existing remote object, addressed by its pipe-delimited import
/// key, into a fresh instance state.
///
/// Nothing counts as configured yet, so the first plan after an import
/// adopts every remote value instead of unsetting it.
pub async fn import(
    client: &dyn RemoteClient,
    ctx: &CallContext,
    schema: &ResourceSchema,
    id: &str,
) -> Result<InstanceState, ProviderError> {
    let identifier = Identifier::decode(schema.identifier_kind(), id)?;
    let snapshot = snapshot::read(client, ctx, schema, &identifier)
        .await?
        .ok_or_else(|| ProviderError::NotFound {
            object_type: schema.kind.to_string(),
            identifier: identifier.to_string(),
        })?;

    tracing::info!(
        resource_type = schema.type_name,
        identifier = %identifier,
        "imported"
    );
    Ok(InstanceState {
        schema_version: schema.version,
        identifier,
        attributes: snapshot.hydrate(schema),
        show_output: snapshot.show_output,
        parameters: snapshot.parameters,
        private: PrivateState::default(),
    })
}
