//! Blocking HTTP transport shared by every backend.

pub mod http;

pub use http::{HttpTransport, TransportConfig, TransportError, DEFAULT_TIMEOUT_SECS, REQUEST_ID_HEADER};
