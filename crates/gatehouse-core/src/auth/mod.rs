//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionManager`: login, pull-based expiry, logout and self-service
//!   profile/password changes on top of a `Storage` handle
//! - `PasswordScheme`: how stored passwords are compared and written
//! - `generate_token`: opaque bearer tokens
//!
//! Sessions expire 24 hours after login unless extended.

pub mod password;
pub mod session;
pub mod token;

pub use password::{hash_password, PasswordScheme};
pub use session::{Session, SessionManager, SessionOptions, DEFAULT_SESSION_TTL_HOURS};
pub use token::generate_token;
