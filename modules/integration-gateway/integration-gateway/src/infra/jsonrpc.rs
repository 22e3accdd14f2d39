//! JSON-RPC 2.0 envelopes.

use serde_json::{Value, json};

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Error object returned by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

impl RpcError {
    /// Message and data joined, as operators expect to read it.
    #[must_use]
    pub fn detail(&self) -> String {
        match &self.data {
            Some(data) if !data.is_empty() => format!("{} {}", self.message, data),
            _ => self.message.clone(),
        }
    }

    /// True when the remote says the session is no longer valid.
    #[must_use]
    pub fn is_session_rejected(&self) -> bool {
        let text = self.detail().to_ascii_lowercase();
        ["session terminated", "not authorised", "not authorized", "re-login", "invalid session"]
            .iter()
            .any(|needle| text.contains(needle))
    }
}

#[must_use]
pub fn request(method: &str, params: Value, auth: Option<&str>) -> Value {
    let mut body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1,
    });
    if let (Some(auth), Some(obj)) = (auth, body.as_object_mut()) {
        obj.insert("auth".to_owned(), Value::String(auth.to_owned()));
    }
    body
}

/// Splits a response into its `result` or its `error`.
///
/// # Errors
///
/// The outer `Err` describes an envelope that is neither.
pub fn parse_response(mut body: Value) -> Result<Result<Value, RpcError>, String> {
    let Some(obj) = body.as_object_mut() else {
        return Err("JSON-RPC response is not an object".to_owned());
    };
    if let Some(err) = obj.get("error").and_then(Value::as_object) {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let data = err.get("data").map(|d| match d {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        return Ok(Err(RpcError {
            code,
            message,
            data,
        }));
    }
    match obj.remove("result") {
        Some(result) => Ok(Ok(result)),
        None => Err("JSON-RPC response has neither result nor error".to_owned()),
    }
}
