//! API versioning and route paths.

/// API base path prefix (version-independent)
pub const API_BASE: &str = "/api";

pub const API_VERSION: &str = "v1";

/// Versioned prefix, e.g. `/api/v1`.
pub const API_PREFIX: &str = "/api/v1";

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Lifetime of signed download URLs handed out by the storage backend.
pub const SIGNED_URL_TTL_SECS: u64 = 900;

/// In-flight requests served concurrently before new ones queue.
pub const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
