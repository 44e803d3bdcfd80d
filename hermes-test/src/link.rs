use async_trait::async_trait;
use hermes::{Link, Request, Response, TransportError};
use parking_lot::Mutex;
use serde_json::Value;
use std::{collections::VecDeque, sync::Arc, time::Duration};

type Reply = Result<Response, TransportError>;

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    /// Repeated once the scripted replies run out
    last: Option<Reply>,
    requests: Vec<Request>
}

/// A link that answers from a script instead of a server and records every request.
///
/// Replies are used in order, the last one repeats forever.
#[derive(Clone, Default)]
pub struct MockLink {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait this long before answering, so requests stay in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn reply(self, reply: Reply) -> Self {
        self.push(reply);
        self
    }

    /// Reply with `{ "data": data }`.
    pub fn reply_data(self, data: Value) -> Self {
        self.reply(Ok(data_response(data)))
    }

    pub fn reply_error(self, error: TransportError) -> Self {
        self.reply(Err(error))
    }

    pub fn push(&self, reply: Reply) {
        self.script.lock().replies.push_back(reply);
    }

    pub fn push_data(&self, data: Value) {
        self.push(Ok(data_response(data)));
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().requests.len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.script.lock().requests.clone()
    }
}

pub fn data_response(data: Value) -> Response {
    Response {
        debug_info: None,
        data: Some(data),
        errors: None
    }
}

#[async_trait]
impl Link for MockLink {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let reply = {
            let mut script = self.script.lock();
            script.requests.push(request);
            match script.replies.pop_front() {
                Some(reply) => {
                    script.last = Some(reply.clone());
                    reply
                }
                None => script.last.clone().unwrap_or_else(|| {
                    Err(TransportError::Network("no reply scripted".to_string()))
                })
            }
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}
