//! Shared infrastructure for Docket services: tracing setup, HTTP middleware and the
//! wire shape of error responses.

pub mod error;
pub mod middleware;
pub mod telemetry;

pub use error::ErrorResponse;
pub use middleware::{get_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};
