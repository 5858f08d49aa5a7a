//! Inspector-style protocol messages emitted by the mock session
//!
//! Each message is one line of compact JSON. Field order is fixed by the
//! struct definitions, so tests can spell expected transcripts out verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::ContextId;
use crate::common::Result;

/// JSON-RPC parse error code
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC method-not-found code
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Server error used for requests invalid in the current state
pub const SERVER_ERROR: i64 = -32000;

/// Inbound request
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Serialize)]
struct Response<'a> {
    id: u64,
    result: &'a Value,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    error: ProtocolError<'a>,
}

#[derive(Serialize)]
struct ProtocolError<'a> {
    code: i64,
    message: &'a str,
}

#[derive(Serialize)]
struct Notification<P> {
    method: &'static str,
    params: P,
}

#[derive(Serialize)]
struct ExecutionContextCreated<'a> {
    context: ExecutionContextDescription<'a>,
}

#[derive(Serialize)]
struct ExecutionContextDescription<'a> {
    id: ContextId,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsoleApiCalled {
    #[serde(rename = "type")]
    kind: &'static str,
    args: Vec<RemoteObject>,
    execution_context_id: ContextId,
}

/// Mirror of an engine value as seen through the protocol
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
}

impl RemoteObject {
    /// A string passed by value
    pub fn string(text: &str) -> Self {
        Self {
            kind: "string",
            value: Some(Value::String(text.to_string())),
            description: None,
            object_id: None,
        }
    }

    /// An object passed by reference
    pub fn object(value: &Value, object_id: u64) -> Self {
        let description = match value {
            Value::Array(items) => format!("Array({})", items.len()),
            Value::Object(_) => "Object".to_string(),
            other => other.to_string(),
        };
        Self {
            kind: "object",
            value: None,
            description: Some(description),
            object_id: Some(object_id.to_string()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Paused<'a> {
    call_frames: Vec<CallFrame<'a>>,
    reason: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CallFrame<'a> {
    call_frame_id: &'static str,
    url: &'a str,
    line_number: usize,
}

#[derive(Serialize)]
struct Empty {}

/// Successful response
pub fn result(id: u64, result: &Value) -> Result<String> {
    Ok(serde_json::to_string(&Response { id, result })?)
}

/// Successful response with an empty result object
pub fn empty_result(id: u64) -> Result<String> {
    result(id, &Value::Object(Default::default()))
}

/// Error response; `id` is absent when the request could not be parsed
pub fn error(id: Option<u64>, code: i64, message: &str) -> Result<String> {
    Ok(serde_json::to_string(&ErrorResponse {
        id,
        error: ProtocolError { code, message },
    })?)
}

pub fn execution_context_created(context_id: ContextId, name: &str) -> Result<String> {
    Ok(serde_json::to_string(&Notification {
        method: "Runtime.executionContextCreated",
        params: ExecutionContextCreated {
            context: ExecutionContextDescription {
                id: context_id,
                name,
            },
        },
    })?)
}

/// `console.log` with the given arguments
pub fn console_api_called(context_id: ContextId, args: Vec<RemoteObject>) -> Result<String> {
    Ok(serde_json::to_string(&Notification {
        method: "Runtime.consoleAPICalled",
        params: ConsoleApiCalled {
            kind: "log",
            args,
            execution_context_id: context_id,
        },
    })?)
}

/// `console.log` of a single string
pub fn console_log(context_id: ContextId, text: &str) -> Result<String> {
    console_api_called(context_id, vec![RemoteObject::string(text)])
}

/// Execution paused at `line` of `url`
pub fn paused(reason: &str, url: &str, line: usize) -> Result<String> {
    Ok(serde_json::to_string(&Notification {
        method: "Debugger.paused",
        params: Paused {
            call_frames: vec![CallFrame {
                call_frame_id: "0",
                url,
                line_number: line,
            }],
            reason,
        },
    })?)
}

pub fn resumed() -> Result<String> {
    Ok(serde_json::to_string(&Notification {
        method: "Debugger.resumed",
        params: Empty {},
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_result() {
        assert_eq!(empty_result(3).unwrap(), r#"{"id":3,"result":{}}"#);
    }

    #[test]
    fn test_parse_error_has_no_id() {
        assert_eq!(
            error(None, PARSE_ERROR, "bad").unwrap(),
            r#"{"error":{"code":-32700,"message":"bad"}}"#
        );
    }

    #[test]
    fn test_console_log_layout() {
        assert_eq!(
            console_log(ContextId(1), "hi").unwrap(),
            r#"{"method":"Runtime.consoleAPICalled","params":{"type":"log","args":[{"type":"string","value":"hi"}],"executionContextId":1}}"#
        );
    }

    #[test]
    fn test_object_reference() {
        let object = RemoteObject::object(&json!([1, 2]), 4);
        assert_eq!(
            serde_json::to_string(&object).unwrap(),
            r#"{"type":"object","description":"Array(2)","objectId":"4"}"#
        );
    }

    #[test]
    fn test_paused_layout() {
        assert_eq!(
            paused("other", "main", 2).unwrap(),
            r#"{"method":"Debugger.paused","params":{"callFrames":[{"callFrameId":"0","url":"main","lineNumber":2}],"reason":"other"}}"#
        );
    }

    #[test]
    fn test_resumed_layout() {
        assert_eq!(
            resumed().unwrap(),
            r#"{"method":"Debugger.resumed","params":{}}"#
        );
    }
}
