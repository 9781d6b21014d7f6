use log::error;
use serde::Serialize;
use serde_json::Value;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Body of every response, whatever the route or outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// `success` below 400, `error` otherwise
    pub status: &'static str,
    pub data: Option<Value>,
    pub error: Option<String>,
}

/// Host independent response: the HTTP status plus the JSON envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    status: u16,
    envelope: Envelope,
}

impl ApiResponse {
    fn build(status: u16, data: Option<Value>, error: Option<String>) -> Self {
        ApiResponse {
            status,
            envelope: Envelope {
                status: if status < 400 { "success" } else { "error" },
                data,
                error,
            },
        }
    }

    pub fn success<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::build(200, Some(value), None),
            Err(err) => {
                error!("Could not serialize response data: {}", err);
                Self::internal_error()
            }
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self::build(status, None, Some(message.to_owned()))
    }

    pub fn bad_request(message: &str) -> Self {
        Self::error(400, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::error(405, "Invalid Method")
    }

    /// Never carries details of what went wrong.
    pub fn internal_error() -> Self {
        Self::error(500, "Internal Server Error")
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The envelope as a JSON string.
    pub fn body_json(&self) -> String {
        // Envelope holds only strings and JSON values.
        serde_json::to_string(&self.envelope).unwrap_or_else(|_| {
            r#"{"status":"error","data":null,"error":"Internal Server Error"}"#.to_owned()
        })
    }
}
