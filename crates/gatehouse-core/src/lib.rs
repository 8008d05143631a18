//! Gatehouse core: session management for the admin console.
//!
//! A `SessionManager` verifies credentials against a stored collection,
//! issues opaque bearer tokens with a 24 hour expiry, and lets the signed-in
//! user edit their profile and password. All state lives behind a
//! `KeyValueStore` supplied by the host.

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use auth::{PasswordScheme, Session, SessionManager, SessionOptions};
pub use config::{Config, StorageBackend};
pub use error::{AuthError, AuthResult, StorageError};
pub use models::{CredentialRecord, ProfileUpdate, SessionUser};
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore, Storage};
