//! Builds the two backends and the mux that serves them as one provider.

use std::sync::Arc;

use crate::error::ProviderError;
use crate::mux::MuxServer;
use crate::protocol::upgrade::UpgradeServer;
use crate::protocol::{ProviderServer, Server, v5};
use crate::provider::Provider;
use crate::remote::ClientFactory;
use crate::resources::{framework_registry, legacy_registry};

/// Native v6 backend: warehouses, compute pools and their data sources.
pub fn framework(factory: Arc<dyn ClientFactory>) -> Server {
    Server::new(Provider::new(framework_registry(), factory))
}

/// v5 backend for policies and account parameters, lifted to v6.
pub fn legacy(factory: Arc<dyn ClientFactory>) -> UpgradeServer<v5::Server> {
    UpgradeServer::new(v5::Server::new(Provider::new(legacy_registry(), factory)))
}

/// Both backends behind one mux, sharing a client factory.
pub async fn provider_server(factory: Arc<dyn ClientFactory>) -> Result<MuxServer, ProviderError> {
    let backends: Vec<Arc<dyn ProviderServer>> = vec![
        Arc::new(framework(factory.clone())),
        Arc::new(legacy(factory)),
    ];
    MuxServer::new(backends).await
}
