use crate::Error as GraphQLError;
use hermes_normalized_cache::{DocumentError, NormalizationError};
use thiserror::Error;

/// A failure to get a response from the transport link.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("server returned error code: {status}\n{body}")]
    Status { status: u16, body: String },
    #[error("decoding error: {0}")]
    Decode(String),
    #[error("encoding error: {0}")]
    Encode(String)
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The server returned errors and no data.
    #[error("query failed: {}", join_errors(.0))]
    GraphQL(Vec<GraphQLError>),
    #[error("failed to normalize response: {0}")]
    Normalization(#[from] NormalizationError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("the request ended before a result was available")]
    Cancelled
}

fn join_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The client configuration couldn't be loaded or is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String }
}
