//! Data models for stored credentials and the cached session identity.

pub mod user;

pub use user::{CredentialRecord, ProfileUpdate, SessionUser, RESERVED_PROFILE_KEYS};
