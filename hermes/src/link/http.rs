use crate::{link::Link, HeaderPair, Request, Response, TransportError};
use reqwest::Url;
use std::time::Duration;

/// The default link, POSTing JSON to a GraphQL endpoint with `reqwest`.
#[derive(Clone)]
pub struct HttpLink {
    client: reqwest::Client,
    endpoint: Url,
    headers: Vec<HeaderPair>,
    timeout: Option<Duration>
}

impl HttpLink {
    pub fn new(endpoint: Url) -> Self {
        HttpLink {
            client: reqwest::Client::new(),
            endpoint,
            headers: Vec::new(),
            timeout: None
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send a header with every request, e.g. an authorization secret.
    pub fn with_header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.push(HeaderPair(name.into(), value.into()));
        self
    }

    pub fn with_headers<I: IntoIterator<Item = HeaderPair>>(mut self, headers: I) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Link headers overridden by the per-request ones. Header names compare case-insensitively.
    fn merge_headers(&self, extra: &[HeaderPair]) -> Vec<HeaderPair> {
        let mut headers: Vec<HeaderPair> = self
            .headers
            .iter()
            .filter(|HeaderPair(name, _)| {
                !extra
                    .iter()
                    .any(|HeaderPair(other, _)| other.eq_ignore_ascii_case(name))
            })
            .cloned()
            .collect();
        headers.extend(extra.iter().cloned());
        headers
    }
}

fn map_send_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

#[async_trait]
impl Link for HttpLink {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let headers = self.merge_headers(&request.headers);
        let body = serde_json::to_vec(&request).map_err(|e| TransportError::Encode(e.to_string()))?;

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body);
        for HeaderPair(key, value) in headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            operation = request.operation_name.as_deref().unwrap_or("<anonymous>"),
            "sending request"
        );
        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status();
        tracing::debug!(status = status.as_u16(), "received response");

        let bytes = response.bytes().await.map_err(map_send_error)?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned()
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }
}
