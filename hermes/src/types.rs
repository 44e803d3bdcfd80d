use crate::{client::Subscription, QueryError, Response};
use futures::{
    channel::mpsc::UnboundedReceiver,
    task::{Context, Poll},
    Stream
};
use hermes_normalized_cache::{QueryDocument, Variables};
use std::{
    fmt,
    hash::{Hash, Hasher},
    pin::Pin,
    sync::Arc
};

/// Whether a query may be answered from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Serve the query from the cache if every selected field is there, fetch otherwise.
    CacheFirst,
    /// Always fetch, then write the result to the cache.
    NetworkOnly
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy::CacheFirst
    }
}

/// An HTTP header, as name and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPair(pub String, pub String);

impl<K: Into<String>, V: Into<String>> From<(K, V)> for HeaderPair {
    fn from((name, value): (K, V)) -> Self {
        HeaderPair(name.into(), value.into())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResultSource {
    Cache,
    Network
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub source: ResultSource,
    pub did_dedup: bool
}

impl DebugInfo {
    pub(crate) fn cache() -> Self {
        DebugInfo {
            source: ResultSource::Cache,
            did_dedup: false
        }
    }

    pub(crate) fn network(did_dedup: bool) -> Self {
        DebugInfo {
            source: ResultSource::Network,
            did_dedup
        }
    }
}

/// Where a query is in its lifecycle.
///
/// `Idle -> Fetching -> Resolved | Failed`, and `Resolved -> Refetching -> Resolved | Failed` when
/// a resolved query goes back to the network.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState {
    Idle,
    Fetching,
    Refetching,
    Resolved,
    Failed(QueryError)
}

impl Default for QueryState {
    fn default() -> Self {
        QueryState::Idle
    }
}

impl QueryState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, QueryState::Fetching | QueryState::Refetching)
    }
}

/// Per-call overrides of the client defaults.
#[derive(Default, Clone)]
pub struct QueryOptions {
    /// Headers to send with this request only. They replace link headers with the same name.
    pub extra_headers: Option<Arc<dyn Fn() -> Vec<HeaderPair> + Send + Sync>>,
    pub fetch_policy: Option<FetchPolicy>
}

impl fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("extra_headers", &self.extra_headers.is_some())
            .field("fetch_policy", &self.fetch_policy)
            .finish()
    }
}

impl QueryOptions {
    pub fn with_fetch_policy(mut self, fetch_policy: FetchPolicy) -> Self {
        self.fetch_policy = Some(fetch_policy);
        self
    }

    pub fn with_extra_headers<F: Fn() -> Vec<HeaderPair> + Send + Sync + 'static>(
        mut self,
        header_fn: F
    ) -> Self {
        self.extra_headers = Some(Arc::new(header_fn));
        self
    }
}

/// Identifies an operation by its document and variables.
///
/// The hash only picks the bucket. Two keys are equal when source, operation name and variables
/// all are, so operations with colliding hashes stay apart.
#[derive(Debug, Clone)]
pub(crate) struct OperationKey {
    hash: u64,
    source: Arc<str>,
    operation_name: Option<Arc<str>>,
    variables: Variables
}

impl OperationKey {
    pub fn new(hash: u64, document: &QueryDocument, variables: &Variables) -> Self {
        OperationKey {
            hash,
            source: Arc::from(document.source()),
            operation_name: document.operation_name().map(Arc::from),
            variables: variables.clone()
        }
    }
}

impl PartialEq for OperationKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.operation_name == other.operation_name
            && self.variables == other.variables
            && self.source == other.source
    }
}

// JSON variables never hold NaN
impl Eq for OperationKey {}

impl Hash for OperationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.hash)
    }
}

/// A document bound to its variables, ready to be executed.
#[derive(Clone)]
pub(crate) struct Operation {
    pub key: OperationKey,
    pub document: QueryDocument,
    pub variables: Variables,
    pub options: QueryOptions
}

/// A stream of results for a watched query. Dropping it disposes the underlying observer.
pub struct Observable {
    inner: UnboundedReceiver<Result<Response, QueryError>>,
    subscription: Subscription
}

impl Observable {
    pub(crate) fn new(
        inner: UnboundedReceiver<Result<Response, QueryError>>,
        subscription: Subscription
    ) -> Self {
        Observable {
            inner,
            subscription
        }
    }

    /// The subscription backing this stream.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Stream for Observable {
    type Item = Result<Response, QueryError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let inner = &mut self.get_mut().inner;
        Pin::new(inner).poll_next(cx)
    }
}
