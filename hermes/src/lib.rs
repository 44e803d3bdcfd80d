//! A GraphQL client with a normalized cache
//!
//! # Getting Started
//!
//! Build a client around a transport link, parse your documents once and run them:
//!
//! ```no_run
//! # tokio_test::block_on(async {
//! use hermes::{Client, HttpLink, QueryDocument, Variables};
//!
//! let link = HttpLink::new("http://localhost:8080/graphql".parse().unwrap())
//!     .with_header("x-admin-secret", std::env::var("ADMIN_SECRET").unwrap());
//! let client = Client::builder(link).build();
//!
//! let query = QueryDocument::parse("query Recipes { recipes { __typename id title } }").unwrap();
//! let response = client.query(&query, Variables::new()).await.unwrap();
//! assert!(response.data.is_some());
//! # });
//! ```
//!
//! # Cache
//!
//! Every response is normalized into a store of entity records, keyed by identity
//! (`Typename:id` by default, see [`TypePolicy`](./struct.TypePolicy.html) to change that).
//! Objects reference each other by identity, so when a mutation returns a new version of an
//! entity, every query that reads it sees the new version.
//!
//! Queries use `FetchPolicy::CacheFirst` by default: if the store holds everything the query
//! selects, it's answered without touching the network. Anything missing means a fetch.
//!
//! # De-duplication
//!
//! Identical queries (same document and variables) that are in flight at the same time share one
//! network request. Every caller gets the result, the followers have `did_dedup` set in their
//! debug info.
//!
//! # Observers
//!
//! [`Client::subscribe`](./struct.Client.html#method.subscribe) and
//! [`Client::watch`](./struct.Client.html#method.watch) register an observer that gets a new
//! result every time an entity it read changes. Disposing the subscription (or dropping the
//! stream) guarantees the callback isn't called again.
//!
//! # Features
//!
//! * `http-link` **(default)** - Include [`HttpLink`](./link/struct.HttpLink.html), based on
//! `reqwest`.

#[macro_use]
extern crate serde;
#[macro_use]
extern crate async_trait;

use std::{collections::HashMap, fmt, fmt::Display};

pub mod client;
pub mod config;
mod error;
pub mod link;
pub(crate) mod types;
pub mod utils;

pub use client::{Client, ClientBuilder, Subscription};
pub use config::ClientConfig;
pub use error::{ConfigError, QueryError, TransportError};
pub use hermes_normalized_cache::{
    CacheMiss, DocumentError, NormalizationError, NormalizedCacheOptions, OperationType,
    QueryDocument, Snapshot, StoreError, TypePolicy, Variables
};
#[cfg(feature = "http-link")]
pub use link::HttpLink;
pub use link::{Link, Request};
pub use types::{
    DebugInfo, FetchPolicy, HeaderPair, Observable, QueryOptions, QueryState, ResultSource
};

/// The generic shape taken by the responses of GraphQL APIs.
///
/// [Spec](https://github.com/facebook/graphql/blob/master/spec/Section%207%20--%20Response.md)
///
/// ```
/// # use serde_json::json;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use hermes::Response;
///
/// let body: Response = serde_json::from_value(json!({
///     "data": {
///         "recipes": [{ "id": "1" }],
///     },
///     "errors": [],
/// }))?;
///
/// let expected: Response = Response {
///     data: Some(json!({ "recipes": [{ "id": "1" }] })),
///     errors: Some(vec![]),
///     debug_info: None
/// };
///
/// assert_eq!(body, expected);
///
/// #     Ok(())
/// # }
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Response<Data: Clone = serde_json::Value> {
    /// Where the result came from. Never sent by servers.
    #[serde(skip_deserializing, rename = "debugInfo")]
    pub debug_info: Option<DebugInfo>,
    /// The absent, partial or complete response data.
    pub data: Option<Data>,
    /// The top-level errors returned by the server.
    pub errors: Option<Vec<Error>>
}

impl<Data: Clone> Response<Data> {
    /// Whether the server returned any errors.
    pub fn has_errors(&self) -> bool {
        self.errors
            .as_ref()
            .map(|errors| !errors.is_empty())
            .unwrap_or(false)
    }
}

/// An element in the top-level `errors` array of a response body.
///
/// This tries to be as close to the GraphQL spec as possible.
///
/// [Spec](https://github.com/facebook/graphql/blob/master/spec/Section%207%20--%20Response.md)
///
/// ```
/// # use serde_json::json;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use hermes::*;
///
/// let body: Response = serde_json::from_value(json!({
///     "data": null,
///     "errors": [
///         {
///             "message": "The server crashed. Sorry.",
///             "locations": [{ "line": 1, "column": 1 }]
///         },
///         {
///             "message": "Seismic activity detected",
///             "path": ["underground", 20]
///         },
///      ],
/// }))?;
///
/// let expected: Response = Response {
///     data: None,
///     errors: Some(vec![
///         Error {
///             message: "The server crashed. Sorry.".to_owned(),
///             locations: Some(vec![
///                 Location {
///                     line: 1,
///                     column: 1,
///                 }
///             ]),
///             path: None,
///             extensions: None,
///         },
///         Error {
///             message: "Seismic activity detected".to_owned(),
///             locations: None,
///             path: Some(vec![
///                 PathFragment::Key("underground".into()),
///                 PathFragment::Index(20),
///             ]),
///             extensions: None,
///         },
///     ]),
///     debug_info: None
/// };
///
/// assert_eq!(body, expected);
///
/// #     Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Error {
    /// The human-readable error message. This is the only required field.
    pub message: String,
    /// Which locations in the query the error applies to.
    pub locations: Option<Vec<Location>>,
    /// Which path in the query the error applies to, e.g. `["users", 0, "email"]`.
    pub path: Option<Vec<PathFragment>>,
    /// Additional errors. Their exact format is defined by the server.
    pub extensions: Option<HashMap<String, serde_json::Value>>
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Use `/` as a separator like JSON Pointer.
        let path = self
            .path
            .as_ref()
            .map(|fragments| {
                fragments
                    .iter()
                    .fold(String::new(), |mut acc, item| {
                        acc.push_str(&format!("{}/", item));
                        acc
                    })
                    .trim_end_matches('/')
                    .to_string()
            })
            .unwrap_or_else(|| "<query>".to_string());

        // Get the location of the error. We'll use just the first location for this.
        let loc = self
            .locations
            .as_ref()
            .and_then(|locations| locations.iter().next())
            .cloned()
            .unwrap_or_else(Location::default);

        write!(f, "{}:{}:{}: {}", path, loc.line, loc.column, self.message)
    }
}

/// Part of a path in a query. It can be an object key or an array index. See [Error](./struct.Error.html).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PathFragment {
    /// A key inside an object
    Key(String),
    /// An index inside an array
    Index(i32)
}

/// Represents a location inside a query string. Used in errors. See [Error](./struct.Error.html).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// The line number in the query string where the error originated (starting from 1).
    pub line: i32,
    /// The column number in the query string where the error originated (starting from 1).
    pub column: i32
}

impl Display for PathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PathFragment::Key(ref key) => write!(f, "{}", key),
            PathFragment::Index(ref idx) => write!(f, "{}", idx)
        }
    }
}
