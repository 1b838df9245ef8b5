//! snowform - a Snowflake provider engine.
//!
//! Plans and applies the lifecycle of Snowflake objects (warehouses, compute
//! pools, policies, account parameters), reconciling configuration, recorded
//! state and the live account, and serves it over the provider plugin
//! protocol.

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod identifier;
pub mod import;
pub mod mux;
pub mod plan;
pub mod protocol;
pub mod provider;
pub mod reconciler;
pub mod remote;
pub mod resources;
pub mod schema;
pub mod snapshot;
pub mod state;
pub mod value;

pub use error::ProviderError;
pub use provider::Provider;
