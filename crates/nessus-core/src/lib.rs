//! Client library for the Nessus vulnerability scanner's XML API.
//!
//! A [`Session`] authenticates once, reusing a persisted token when the
//! server still accepts it, and exposes the operation layer through
//! [`Session::client`]. Listing replies are turned into records by the
//! generic extractor in [`extract`].

pub mod api;
pub mod auth;
pub mod config;
pub mod extract;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, HttpTransport, LaunchScan, Result, Transport};
pub use auth::{Credentials, FileTokenCache, MemoryTokenCache, Session, Token, TokenCache};
pub use config::Config;
pub use extract::{extract, Extraction, ExtractRequest, Record, Value};
