pub mod event;
pub mod path;
pub mod request;
pub mod response;

/// Header set by the gateway (or an internal caller) carrying the
/// authenticated user id downstream.
pub const HEADER_USER_ID: &str = "x-user-id";

/// Header carrying the shared internal API key on service-to-service calls.
pub const HEADER_INTERNAL_API_KEY: &str = "x-internal-api-key";
