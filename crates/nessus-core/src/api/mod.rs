//! Client for the scanner's form-in, XML-out HTTP API.
//!
//! This module provides the `ApiClient` operation layer, the `Transport`
//! seam it sends requests through, and the `ApiError` kinds every
//! operation can fail with.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{is_unauthorized, ApiClient, LaunchScan, UNAUTHORIZED_MARKER};
pub use error::{ApiError, Result};
pub use transport::{FormParams, HttpTransport, HttpTransportBuilder, Transport};
