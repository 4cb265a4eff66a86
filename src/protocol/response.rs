use serde_json::{Map, Value};

use super::Frame;

/// Error envelope returned by the service in place of a result.
///
/// The service answers failed requests with `{"type": "error", "code": ..,
/// "text": ..}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// `mindUnavailable`: the service timed out and the request may be retried.
    Unavailable,
    /// `internalError`: the service failed on this query.
    Internal { text: String },
    Other { code: String, text: String },
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    rpc_id: u64,
    body: Map<String, Value>,
}

impl Response {
    pub fn new(rpc_id: u64, body: Map<String, Value>) -> Self {
        Self { rpc_id, body }
    }

    pub fn rpc_id(&self) -> u64 {
        self.rpc_id
    }

    /// The `type` discriminator, e.g. `collectionList` or `error`.
    pub fn kind(&self) -> Option<&str> {
        self.body.get("type").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_body(self) -> Map<String, Value> {
        self.body
    }

    /// Classifies the response's error envelope, if it carries one.
    pub fn error(&self) -> Option<ResponseError> {
        let code = self.body.get("code").and_then(Value::as_str);
        if code.is_none() && self.kind() != Some("error") {
            return None;
        }

        let text = self
            .body
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Some(match code {
            Some("mindUnavailable") => ResponseError::Unavailable,
            Some("internalError") => ResponseError::Internal { text },
            code => ResponseError::Other {
                code: code.unwrap_or("unknown").to_string(),
                text,
            },
        })
    }
}

impl From<Frame> for Response {
    fn from(value: Frame) -> Self {
        let rpc_id = value.rpc_id;
        Response::new(rpc_id, value.into_body())
    }
}
