//! Remote client backed by the Snowflake SQL API (`/api/v2/statements`).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};

use super::sql::{self, ResultSet, Row};
use super::{
    Alteration, ClientFactory, CreateRequest, ObjectKind, ParameterScope, ParameterValue,
    RemoteClient, RemoteError, RemoteObject, ShowFilter,
};
use crate::config::{Authenticator, ProviderConfig};
use crate::error::ProviderError;
use crate::identifier::Identifier;
use crate::value::Record;

const TOKEN_TYPE_HEADER: &str = "x-snowflake-authorization-token-type";
const STATEMENT_TIMEOUT_SECS: u64 = 60;
const NOT_FOUND_MARKER: &str = "does not exist or not authorized";

#[derive(Clone)]
pub struct SqlApiClient {
    client: reqwest::Client,
    base_url: String,
    role: Option<String>,
    warehouse: Option<String>,
}

/// SECURITY: the bearer token lives only in the client's default headers
/// and is never printed.
impl fmt::Debug for SqlApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlApiClient")
            .field("base_url", &self.base_url)
            .field("role", &self.role)
            .field("warehouse", &self.warehouse)
            .finish_non_exhaustive()
    }
}

impl SqlApiClient {
    pub fn new(
        account: &str,
        token: &str,
        authenticator: Authenticator,
    ) -> Result<Self, RemoteError> {
        Self::with_base_url(
            format!("https://{account}.snowflakecomputing.com"),
            token,
            authenticator,
        )
    }

    /// NOTE: Primarily used for testing with mock servers.
    pub fn with_base_url(
        base_url: String,
        token: &str,
        authenticator: Authenticator,
    ) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        let auth_value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            RemoteError::Unauthorized {
                message: "Invalid token format".to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            TOKEN_TYPE_HEADER,
            HeaderValue::from_static(authenticator.as_str()),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("snowform/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(RemoteError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            role: None,
            warehouse: None,
        })
    }

    /// Role and warehouse sent with every statement.
    pub fn with_session(mut self, role: Option<String>, warehouse: Option<String>) -> Self {
        self.role = role;
        self.warehouse = warehouse;
        self
    }

    pub async fn execute(&self, statement: &str) -> Result<ResultSet, RemoteError> {
        let url = format!("{}/api/v2/statements", self.base_url);
        let mut body = serde_json::json!({
            "statement": statement,
            "timeout": STATEMENT_TIMEOUT_SECS,
        });
        if let Some(role) = &self.role {
            body["role"] = serde_json::Value::from(role.as_str());
        }
        if let Some(warehouse) = &self.warehouse {
            body["warehouse"] = serde_json::Value::from(warehouse.as_str());
        }

        tracing::debug!(%statement, "executing statement");
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        if status.as_u16() == 202 {
            return Err(RemoteError::Transient {
                message: "statement is still running".to_string(),
            });
        }
        if status.is_success() {
            return response
                .json::<ResultSet>()
                .await
                .map_err(|e| RemoteError::Decode {
                    message: format!("Failed to parse response: {e}"),
                });
        }

        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();

        Err(match status.as_u16() {
            401 | 403 => RemoteError::Unauthorized { message },
            code => RemoteError::Api {
                status: code,
                message,
            },
        })
    }

    async fn query(&self, statement: &str) -> Result<Vec<Row>, RemoteError> {
        Ok(self.execute(statement).await?.rows())
    }

    async fn run(
        &self,
        statement: &str,
        target: Option<(ObjectKind, &Identifier)>,
    ) -> Result<(), RemoteError> {
        self.execute(statement)
            .await
            .map(|_| ())
            .map_err(|e| refine(e, target))
    }
}

/// Statement compilation errors (422) become `NotFound` or `Conflict`.
fn refine(err: RemoteError, target: Option<(ObjectKind, &Identifier)>) -> RemoteError {
    match err {
        RemoteError::Api {
            status: 422,
            message,
        } => match target {
            Some((kind, id)) if message.contains(NOT_FOUND_MARKER) => {
                RemoteError::not_found(kind, id)
            }
            _ => RemoteError::Conflict { message },
        },
        other => other,
    }
}

fn scope_target(scope: &ParameterScope) -> Option<(ObjectKind, &Identifier)> {
    match scope {
        ParameterScope::Account => None,
        ParameterScope::Object { kind, identifier } => Some((*kind, identifier)),
    }
}

#[async_trait]
impl RemoteClient for SqlApiClient {
    async fn show(
        &self,
        kind: ObjectKind,
        filter: &ShowFilter,
    ) -> Result<Vec<RemoteObject>, RemoteError> {
        let rows = self
            .query(&sql::show(kind, filter))
            .await
            .map_err(|e| refine(e, None))?;
        rows.iter()
            // Only account-level overrides exist as managed parameters.
            .filter(|row| {
                kind != ObjectKind::AccountParameter
                    || row.get("level").is_some_and(|l| l.eq_ignore_ascii_case("ACCOUNT"))
            })
            .map(|row| sql::decode_object(kind, row, &filter.scope))
            .collect()
    }

    async fn describe(&self, kind: ObjectKind, id: &Identifier) -> Result<Record, RemoteError> {
        match kind {
            ObjectKind::MaskingPolicy | ObjectKind::RowAccessPolicy => {
                let rows = self
                    .query(&sql::describe(kind, id))
                    .await
                    .map_err(|e| refine(e, Some((kind, id))))?;
                if rows.is_empty() {
                    return Err(RemoteError::not_found(kind, id));
                }
                sql::decode_describe(kind, &rows)
            }
            // SHOW already carries every property these kinds expose.
            _ => self
                .show(kind, &ShowFilter::exact(id))
                .await?
                .into_iter()
                .find(|o| &o.identifier == id)
                .map(|o| o.properties)
                .ok_or_else(|| RemoteError::not_found(kind, id)),
        }
    }

    async fn create(
        &self,
        kind: ObjectKind,
        id: &Identifier,
        request: &CreateRequest,
    ) -> Result<(), RemoteError> {
        self.run(&sql::create(kind, id, request), None).await
    }

    async fn alter(
        &self,
        kind: ObjectKind,
        id: &Identifier,
        alteration: &Alteration,
    ) -> Result<(), RemoteError> {
        for statement in sql::alter(kind, id, alteration) {
            self.run(&statement, Some((kind, id))).await?;
        }
        Ok(())
    }

    async fn drop(&self, kind: ObjectKind, id: &Identifier) -> Result<(), RemoteError> {
        self.run(&sql::drop(kind, id), Some((kind, id))).await
    }

    async fn rename(
        &self,
        kind: ObjectKind,
        from: &Identifier,
        to: &Identifier,
    ) -> Result<(), RemoteError> {
        self.run(&sql::rename(kind, from, to), Some((kind, from)))
            .await
    }

    async fn set_parameters(
        &self,
        scope: &ParameterScope,
        values: &Record,
    ) -> Result<(), RemoteError> {
        self.run(&sql::set_parameters(scope, values), scope_target(scope))
            .await
    }

    async fn unset_parameters(
        &self,
        scope: &ParameterScope,
        keys: &[String],
    ) -> Result<(), RemoteError> {
        self.run(&sql::unset_parameters(scope, keys), scope_target(scope))
            .await
    }

    async fn show_parameters(
        &self,
        scope: &ParameterScope,
    ) -> Result<Vec<ParameterValue>, RemoteError> {
        let rows = self
            .query(&sql::show_parameters(scope))
            .await
            .map_err(|e| refine(e, scope_target(scope)))?;
        let mut values = rows
            .iter()
            .map(sql::decode_parameter)
            .collect::<Result<Vec<_>, _>>()?;

        if let ParameterScope::Object { .. } = scope {
            // Removing the object override falls back to the account's
            // effective value, not the built-in default.
            let account = self
                .query(&sql::show_parameters(&ParameterScope::Account))
                .await?
                .iter()
                .map(sql::decode_parameter)
                .collect::<Result<Vec<_>, _>>()?;
            for value in &mut values {
                if let Some(effective) = account.iter().find(|a| a.key == value.key) {
                    value.inherited = effective.value.clone();
                }
            }
        }
        Ok(values)
    }
}

/// Connects to the SQL API with token authentication.
#[derive(Debug, Clone, Default)]
pub struct SqlApiFactory {
    base_url: Option<String>,
}

impl SqlApiFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// NOTE: Primarily used for testing with mock servers.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
        }
    }

    fn base_url(&self, config: &ProviderConfig) -> Result<String, ProviderError> {
        if let Some(url) = &self.base_url {
            return Ok(url.clone());
        }
        if let Some(host) = &config.host {
            return Ok(if host.starts_with("http://") || host.starts_with("https://") {
                host.clone()
            } else {
                format!("https://{host}")
            });
        }
        config
            .account_identifier()
            .map(|account| format!("https://{account}.snowflakecomputing.com"))
            .ok_or_else(|| {
                ProviderError::Config(
                    "account_name is required (set it, SNOWFLAKE_ACCOUNT_NAME, or host)"
                        .to_string(),
                )
            })
    }
}

#[async_trait]
impl ClientFactory for SqlApiFactory {
    async fn connect(
        &self,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn RemoteClient>, ProviderError> {
        let authenticator = match config.authenticator {
            None | Some(Authenticator::Oauth) => Authenticator::Oauth,
            Some(Authenticator::ProgrammaticAccessToken) => Authenticator::ProgrammaticAccessToken,
            Some(other) => {
                return Err(ProviderError::Config(format!(
                    "authenticator {other} is not supported by the SQL API client; use OAUTH or PROGRAMMATIC_ACCESS_TOKEN"
                )));
            }
        };
        let token = config.token.as_deref().ok_or_else(|| {
            ProviderError::Config(format!("token is required for {authenticator} authentication"))
        })?;
        let base_url = self.base_url(config)?;

        let client = SqlApiClient::with_base_url(base_url.clone(), token, authenticator)
            .map_err(ProviderError::from)?
            .with_session(config.role.clone(), config.warehouse.clone());

        tracing::info!(%base_url, %authenticator, "connected to Snowflake SQL API");
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_does_not_leak_token() {
        let token = "sf_super_secret_token_12345";
        let client = SqlApiClient::with_base_url(
            "http://localhost".to_string(),
            token,
            Authenticator::Oauth,
        )
        .unwrap();
        assert!(!format!("{client:?}").contains(token));
    }

    #[test]
    fn test_refine_not_found() {
        let id = Identifier::account("W1");
        let err = refine(
            RemoteError::Api {
                status: 422,
                message: "Warehouse 'W1' does not exist or not authorized.".to_string(),
            },
            Some((ObjectKind::Warehouse, &id)),
        );
        assert!(err.is_not_found());

        let err = refine(
            RemoteError::Api {
                status: 422,
                message: "invalid value".to_string(),
            },
            Some((ObjectKind::Warehouse, &id)),
        );
        assert!(matches!(err, RemoteError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_factory_rejects_unsupported_authenticator() {
        let config = ProviderConfig {
            account_name: Some("acct".to_string()),
            token: Some("t".to_string()),
            authenticator: Some(Authenticator::Externalbrowser),
            ..ProviderConfig::default()
        };
        let err = SqlApiFactory::new().connect(&config).await.err().unwrap();
        assert!(err.to_string().contains("EXTERNALBROWSER"));
    }

    #[tokio::test]
    async fn test_factory_requires_account() {
        let config = ProviderConfig {
            token: Some("t".to_string()),
            ..ProviderConfig::default()
        };
        let err = SqlApiFactory::new().connect(&config).await.err().unwrap();
        assert!(err.to_string().contains("account_name is required"));
    }
}
