//! Authentication module for the scanner session.
//!
//! This module provides:
//! - `Session`: token lifecycle (reuse, validate, login, persist, logout)
//! - `Credentials`: server address and login, password wiped on drop
//! - `TokenCache`: where the token survives between runs (`FileTokenCache`,
//!   `MemoryTokenCache`)
//!
//! A persisted token is only trusted after the server accepts it again.

pub mod credentials;
pub mod session;
pub mod token;
pub mod token_cache;

pub use credentials::Credentials;
pub use session::{Session, SessionState, TokenSource};
pub use token::Token;
pub use token_cache::{FileTokenCache, MemoryTokenCache, TokenCache, DEFAULT_TOKEN_FILE};
