//! Provider configuration surface.
//!
//! Values are resolved from three layers, highest precedence first: the
//! attributes passed to Configure, `SNOWFLAKE_*` environment variables, and
//! a profile of the TOML credential file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{AttributePath, Diagnostic, Diagnostics};
use crate::error::ProviderError;
use crate::schema::{AttributeDescriptor, AttributeType, Block};
use crate::value::{Config, Value};

pub const DEFAULT_PROFILE: &str = "default";

/// Feature names accepted by `preview_features_enabled`.
pub const PREVIEW_FEATURES: &[&str] = &[
    "snowflake_compute_pool_resource",
    "snowflake_compute_pools_datasource",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authenticator {
    Snowflake,
    Oauth,
    ProgrammaticAccessToken,
    SnowflakeJwt,
    Externalbrowser,
}

impl Authenticator {
    pub const ALL: &'static [&'static str] = &[
        "SNOWFLAKE",
        "OAUTH",
        "PROGRAMMATIC_ACCESS_TOKEN",
        "SNOWFLAKE_JWT",
        "EXTERNALBROWSER",
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Authenticator::Snowflake => "SNOWFLAKE",
            Authenticator::Oauth => "OAUTH",
            Authenticator::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
            Authenticator::SnowflakeJwt => "SNOWFLAKE_JWT",
            Authenticator::Externalbrowser => "EXTERNALBROWSER",
        }
    }
}

impl fmt::Display for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Authenticator {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SNOWFLAKE" => Ok(Authenticator::Snowflake),
            "OAUTH" => Ok(Authenticator::Oauth),
            "PROGRAMMATIC_ACCESS_TOKEN" => Ok(Authenticator::ProgrammaticAccessToken),
            "SNOWFLAKE_JWT" => Ok(Authenticator::SnowflakeJwt),
            "EXTERNALBROWSER" => Ok(Authenticator::Externalbrowser),
            _ => Err(ProviderError::Config(format!(
                "unknown authenticator \"{s}\", expected one of {}",
                Authenticator::ALL.join(", ")
            ))),
        }
    }
}

/// Resolved provider configuration.
///
/// SECURITY: `password` and `token` are redacted from `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub profile: Option<String>,
    pub config_path: Option<PathBuf>,
    pub account_name: Option<String>,
    pub organization_name: Option<String>,
    pub region: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub authenticator: Option<Authenticator>,
    pub token: Option<String>,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub host: Option<String>,
    pub preview_features_enabled: Vec<String>,
    pub disable_query_context_cache: Option<bool>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ProviderConfig")
            .field("profile", &self.profile)
            .field("config_path", &self.config_path)
            .field("account_name", &self.account_name)
            .field("organization_name", &self.organization_name)
            .field("region", &self.region)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("authenticator", &self.authenticator)
            .field("token", &redact(&self.token))
            .field("role", &self.role)
            .field("warehouse", &self.warehouse)
            .field("host", &self.host)
            .field("preview_features_enabled", &self.preview_features_enabled)
            .field(
                "disable_query_context_cache",
                &self.disable_query_context_cache,
            )
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve against the process environment and the credential file.
    pub fn resolve(explicit: &Config) -> Result<Self, ProviderError> {
        Self::resolve_with(explicit, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(
        explicit: &Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProviderError> {
        let explicit = Self::from_attributes(explicit)?;
        let from_env = Self::from_env(&env)?;

        let profile = explicit
            .profile
            .clone()
            .or_else(|| from_env.profile.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

        let (path, path_is_explicit) = match explicit
            .config_path
            .clone()
            .or_else(|| from_env.config_path.clone())
        {
            Some(path) => (Some(path), true),
            None => (default_config_path(), false),
        };

        let from_file = match path {
            Some(path) if path.exists() => Self::from_file(&path, &profile)?,
            Some(path) if path_is_explicit => {
                return Err(ProviderError::Config(format!(
                    "credential file {} does not exist",
                    path.display()
                )));
            }
            _ => Self::default(),
        };

        let mut resolved = explicit.over(from_env).over(from_file);
        resolved.profile = Some(profile);
        resolved.check()?;

        tracing::debug!(
            profile = resolved.profile.as_deref().unwrap_or(DEFAULT_PROFILE),
            account = resolved.account_name.as_deref().unwrap_or("<unset>"),
            "resolved provider configuration"
        );
        Ok(resolved)
    }

    /// Fields of `self` win; gaps are filled from `lower`.
    fn over(self, lower: Self) -> Self {
        Self {
            profile: self.profile.or(lower.profile),
            config_path: self.config_path.or(lower.config_path),
            account_name: self.account_name.or(lower.account_name),
            organization_name: self.organization_name.or(lower.organization_name),
            region: self.region.or(lower.region),
            user: self.user.or(lower.user),
            password: self.password.or(lower.password),
            authenticator: self.authenticator.or(lower.authenticator),
            token: self.token.or(lower.token),
            role: self.role.or(lower.role),
            warehouse: self.warehouse.or(lower.warehouse),
            host: self.host.or(lower.host),
            preview_features_enabled: if self.preview_features_enabled.is_empty() {
                lower.preview_features_enabled
            } else {
                self.preview_features_enabled
            },
            disable_query_context_cache: self
                .disable_query_context_cache
                .or(lower.disable_query_context_cache),
        }
    }

    fn from_attributes(config: &Config) -> Result<Self, ProviderError> {
        let text = |name: &str| config.get_str(name).map(str::to_string);
        let authenticator = text("authenticator")
            .map(|s| s.parse::<Authenticator>())
            .transpose()?;
        let preview_features_enabled = config
            .get("preview_features_enabled")
            .as_set()
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            profile: text("profile"),
            config_path: text("config_path").map(PathBuf::from),
            account_name: text("account_name"),
            organization_name: text("organization_name"),
            region: text("region"),
            user: text("user"),
            password: text("password"),
            authenticator,
            token: text("token"),
            role: text("role"),
            warehouse: text("warehouse"),
            host: text("host"),
            preview_features_enabled,
            disable_query_context_cache: config
                .get("disable_query_context_cache")
                .as_set()
                .and_then(Value::as_bool),
        })
    }

    fn from_env(env: &impl Fn(&str) -> Option<String>) -> Result<Self, ProviderError> {
        let var = |name: &str| env(name).filter(|v| !v.is_empty());
        let authenticator = var("SNOWFLAKE_AUTHENTICATOR")
            .map(|s| s.parse::<Authenticator>())
            .transpose()?;
        let disable_query_context_cache = var("SNOWFLAKE_DISABLE_QUERY_CONTEXT_CACHE")
            .map(|v| {
                v.parse::<bool>().map_err(|_| {
                    ProviderError::Config(format!(
                        "SNOWFLAKE_DISABLE_QUERY_CONTEXT_CACHE must be true or false, got \"{v}\""
                    ))
                })
            })
            .transpose()?;
        Ok(Self {
            profile: var("SNOWFLAKE_PROFILE"),
            config_path: var("SNOWFLAKE_CONFIG_PATH").map(PathBuf::from),
            account_name: var("SNOWFLAKE_ACCOUNT_NAME"),
            organization_name: var("SNOWFLAKE_ORGANIZATION_NAME"),
            region: var("SNOWFLAKE_REGION"),
            user: var("SNOWFLAKE_USER"),
            password: var("SNOWFLAKE_PASSWORD"),
            authenticator,
            token: var("SNOWFLAKE_TOKEN"),
            role: var("SNOWFLAKE_ROLE"),
            warehouse: var("SNOWFLAKE_WAREHOUSE"),
            host: var("SNOWFLAKE_HOST"),
            preview_features_enabled: var("SNOWFLAKE_PREVIEW_FEATURES_ENABLED")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            disable_query_context_cache,
        })
    }

    fn from_file(path: &Path, profile: &str) -> Result<Self, ProviderError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut profiles: BTreeMap<String, ProviderConfig> = toml::from_str(&raw).map_err(|e| {
            ProviderError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        profiles.remove(profile).ok_or_else(|| {
            ProviderError::Config(format!(
                "profile \"{profile}\" not found in {}",
                path.display()
            ))
        })
    }

    fn check(&self) -> Result<(), ProviderError> {
        let mut diags = Diagnostics::new();
        for feature in &self.preview_features_enabled {
            if !PREVIEW_FEATURES.contains(&feature.as_str()) {
                diags.push(
                    Diagnostic::error(format!("unknown preview feature \"{feature}\""))
                        .at(AttributePath::root("preview_features_enabled"))
                        .with_detail(format!("expected one of {}", PREVIEW_FEATURES.join(", "))),
                );
            }
        }
        if diags.has_errors() {
            return Err(ProviderError::Validation(diags));
        }
        Ok(())
    }

    pub fn is_preview_enabled(&self, feature: &str) -> bool {
        self.preview_features_enabled.iter().any(|f| f == feature)
    }

    /// Account identifier in `<organization>-<account>` form when both are known.
    pub fn account_identifier(&self) -> Option<String> {
        match (&self.organization_name, &self.account_name) {
            (Some(org), Some(account)) => Some(format!("{org}-{account}")),
            (None, Some(account)) => Some(account.clone()),
            _ => None,
        }
    }
}

/// `~/.snowflake/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".snowflake").join("config.toml"))
}

/// Schema of the Configure request shared by every backend.
pub fn provider_block() -> Block {
    let text = |name: &'static str, description: &'static str| {
        AttributeDescriptor::string(name)
            .host_only()
            .describe(description)
    };
    Block::new(vec![
        text("profile", "Credential profile name"),
        text("config_path", "Path to the TOML credential file"),
        text("account_name", "Account name"),
        text("organization_name", "Organization name"),
        text("region", "Account region"),
        text("user", "Login name"),
        text("password", "Password").sensitive(),
        AttributeDescriptor::enumeration("authenticator", Authenticator::ALL).host_only(),
        text("token", "OAuth or programmatic access token").sensitive(),
        text("role", "Default role"),
        text("warehouse", "Default warehouse"),
        text("host", "Overrides the account URL host"),
        AttributeDescriptor::new("preview_features_enabled", AttributeType::StringSet)
            .host_only()
            .describe("Enables non-GA resources and data sources"),
        AttributeDescriptor::bool("disable_query_context_cache").host_only(),
    ])
}
