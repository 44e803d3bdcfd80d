//! Client configuration, layered from an optional file and `HERMES_*` environment variables.

use crate::{ConfigError, FetchPolicy, HeaderPair};
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use hermes_normalized_cache::TypePolicy;
use std::{collections::BTreeMap, path::Path};

const ENV_PREFIX: &str = "HERMES";

/// Everything needed to build a client talking to one GraphQL endpoint.
///
/// ```toml
/// endpoint = "https://example.com/v1/graphql"
/// default_fetch_policy = "network-only"
/// timeout_secs = 10
///
/// [headers]
/// x-admin-secret = "..."
///
/// [type_policies.Book]
/// key_fields = ["isbn"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, alias = "defaultFetchPolicy")]
    pub default_fetch_policy: FetchPolicy,
    #[serde(default, alias = "typePolicies")]
    pub type_policies: BTreeMap<String, TypePolicy>,
    #[serde(default, alias = "timeoutSecs")]
    pub timeout_secs: Option<u64>
}

impl ClientConfig {
    /// Load the configuration from `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        Self::from_builder(builder)
    }

    pub(crate) fn from_builder(
        builder: ConfigBuilder<DefaultState>
    ) -> Result<Self, ConfigError> {
        let builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
        );
        let config: ClientConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(endpoint) = &self.endpoint {
            if endpoint.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "endpoint",
                    reason: "must not be empty".to_string()
                });
            }
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                key: "timeout_secs",
                reason: "must be greater than zero".to_string()
            });
        }
        if let Some(name) = self.headers.keys().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                key: "headers",
                reason: format!("invalid header name `{}`", name)
            });
        }
        Ok(())
    }

    pub fn header_pairs(&self) -> Vec<HeaderPair> {
        self.headers
            .iter()
            .map(|(name, value)| HeaderPair(name.clone(), value.clone()))
            .collect()
    }

    #[cfg(feature = "http-link")]
    pub fn endpoint_url(&self) -> Result<reqwest::Url, ConfigError> {
        let endpoint = self.endpoint.as_deref().ok_or_else(|| ConfigError::Invalid {
            key: "endpoint",
            reason: "no endpoint configured".to_string()
        })?;
        reqwest::Url::parse(endpoint).map_err(|e| ConfigError::Invalid {
            key: "endpoint",
            reason: e.to_string()
        })
    }
}
