//! # Actix Middleware Library
//!
//! HTTP middleware shared by messenger services
//!
//! ## Modules
//! - `request_id`: propagates or mints `x-request-id`
//! - `access_log`: one tracing line per completed request

pub mod access_log;
pub mod request_id;

pub use access_log::AccessLog;
pub use request_id::{request_id, RequestId, RequestIdValue};
