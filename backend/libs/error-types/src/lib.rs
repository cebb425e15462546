use serde::{Deserialize, Serialize};

/// JSON body returned by every failed HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short reason phrase ("Bad Request", "Unauthorized", ...)
    pub error: String,

    /// Human readable explanation
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Coarse category clients can branch on:
    /// - "validation_error"
    /// - "authentication_error"
    /// - "not_found_error"
    /// - "conflict_error"
    /// - "storage_error"
    /// - "server_error"
    pub error_type: String,

    /// Stable machine code, see [`error_codes`]
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// RFC 3339
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            request_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

/// Reason phrase for the status codes the messenger emits.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        409 => "Conflict",
        503 => "Service Unavailable",
        500 => "Internal Server Error",
        _ => "Error",
    }
}

pub mod error_codes {
    // Request validation
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const MESSAGE_EMPTY: &str = "MESSAGE_EMPTY";
    pub const MESSAGE_TOO_LONG: &str = "MESSAGE_TOO_LONG";
    pub const RECIPIENT_INVALID: &str = "RECIPIENT_INVALID";

    // Authentication
    pub const SESSION_MISSING: &str = "SESSION_MISSING";
    pub const SESSION_INVALID: &str = "SESSION_INVALID";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";

    // Users
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const USERNAME_TAKEN: &str = "USERNAME_TAKEN";

    // Infrastructure
    pub const STORAGE_UNAVAILABLE: &str = "STORAGE_UNAVAILABLE";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}
