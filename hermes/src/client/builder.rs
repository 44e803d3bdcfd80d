use crate::{client::ClientImpl, Client, FetchPolicy, Link};
#[cfg(feature = "http-link")]
use crate::{ClientConfig, ConfigError, HttpLink};
use hermes_normalized_cache::{NormalizedCacheOptions, Store, TypePolicy};
use std::sync::Arc;
#[cfg(feature = "http-link")]
use std::time::Duration;

pub struct ClientBuilder<L: Link> {
    link: L,
    fetch_policy: FetchPolicy,
    cache_options: NormalizedCacheOptions
}

impl<L: Link> ClientBuilder<L> {
    pub fn new(link: L) -> Self {
        ClientBuilder {
            link,
            fetch_policy: FetchPolicy::CacheFirst,
            cache_options: NormalizedCacheOptions::default()
        }
    }

    /// The fetch policy used by queries that don't set one.
    pub fn with_fetch_policy(mut self, fetch_policy: FetchPolicy) -> Self {
        self.fetch_policy = fetch_policy;
        self
    }

    pub fn with_type_policy<S: Into<String>>(mut self, typename: S, policy: TypePolicy) -> Self {
        self.cache_options = self.cache_options.with_type_policy(typename, policy);
        self
    }

    pub fn with_cache_options(mut self, cache_options: NormalizedCacheOptions) -> Self {
        self.cache_options = cache_options;
        self
    }

    pub fn build(self) -> Client<L> {
        let store = Store::new(self.cache_options);
        let client = ClientImpl::new(self.link, self.fetch_policy, store);

        Client(Arc::new(client))
    }
}

#[cfg(feature = "http-link")]
impl ClientBuilder<HttpLink> {
    /// A builder for an `HttpLink` client set up from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let mut link = HttpLink::new(config.endpoint_url()?).with_headers(config.header_pairs());
        if let Some(timeout_secs) = config.timeout_secs {
            link = link.with_timeout(Duration::from_secs(timeout_secs));
        }

        let mut cache_options = NormalizedCacheOptions::default();
        for (typename, policy) in &config.type_policies {
            cache_options = cache_options.with_type_policy(typename.clone(), policy.clone());
        }

        Ok(ClientBuilder::new(link)
            .with_fetch_policy(config.default_fetch_policy)
            .with_cache_options(cache_options))
    }
}
