//! Transport links. A link takes a request and returns the server's response, it knows nothing
//! about caching.

#[cfg(feature = "http-link")]
mod http;

use crate::{HeaderPair, Response, TransportError};
use hermes_normalized_cache::{QueryDocument, Variables};
#[cfg(feature = "http-link")]
pub use http::HttpLink;
use std::sync::Arc;

/// A GraphQL request, in the form it is sent over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub query: String,
    pub variables: Variables,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Extra headers for this request only.
    #[serde(skip)]
    pub headers: Vec<HeaderPair>
}

impl Request {
    pub fn new(document: &QueryDocument, variables: Variables) -> Self {
        Request {
            query: document.source().to_string(),
            variables,
            operation_name: document.operation_name().map(ToString::to_string),
            headers: Vec::new()
        }
    }

    pub fn with_headers(mut self, headers: Vec<HeaderPair>) -> Self {
        self.headers = headers;
        self
    }
}

/// Sends requests to a GraphQL server. Links are stateless between calls.
#[async_trait]
pub trait Link: Send + Sync + 'static {
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

#[async_trait]
impl<L: Link> Link for Arc<L> {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_serialize_to_the_wire_format() {
        let document = QueryDocument::parse("query Recipe($id: ID!) { recipe(id: $id) { id } }")
            .unwrap();
        let mut variables = Variables::new();
        variables.insert("id".to_string(), json!("1"));
        let request = Request::new(&document, variables)
            .with_headers(vec![HeaderPair("x-trace".to_string(), "1".to_string())]);

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "query": "query Recipe($id: ID!) { recipe(id: $id) { id } }",
                "variables": { "id": "1" },
                "operationName": "Recipe"
            })
        );
    }

    #[test]
    fn anonymous_operations_omit_the_name() {
        let document = QueryDocument::parse("{ recipes { id } }").unwrap();
        let request = Request::new(&document, Variables::new());
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("operationName").is_none());
    }
}
