use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::password::PasswordScheme;
use super::token::generate_token;
use crate::error::{AuthError, AuthResult};
use crate::models::{CredentialRecord, ProfileUpdate, SessionUser};
use crate::storage::Storage;

/// Session lifetime in hours, measured from login or the last `extend`.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Storage keys, relative to the storage namespace.
pub const TOKEN_KEY: &str = "token";
pub const TOKEN_EXPIRY_KEY: &str = "token_expiry";
pub const USER_KEY: &str = "user";
pub const USERS_KEY: &str = "users";

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A logged-in state: the cached identity, its bearer token and the absolute
/// expiry in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: SessionUser,
    pub token: String,
    pub expires_at: i64,
}

impl Session {
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at)
    }

    pub fn is_expired(&self) -> bool {
        now_ms() > self.expires_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        Duration::milliseconds(self.expires_at - now_ms())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }

    /// Remaining lifetime as e.g. "23h 59m", "12m" or "expired".
    pub fn remaining_display(&self) -> String {
        if self.is_expired() {
            return "expired".to_string();
        }
        let minutes = self.minutes_until_expiry();
        if minutes < 1 {
            "under a minute".to_string()
        } else if minutes < 60 {
            format!("{}m", minutes)
        } else {
            format!("{}h {}m", minutes / 60, minutes % 60)
        }
    }
}

/// Tunables for a `SessionManager`.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub ttl: Duration,
    /// Delay awaited before each asynchronous operation does any work.
    /// Zero skips the timer entirely.
    pub latency: StdDuration,
    pub password_scheme: PasswordScheme,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            latency: StdDuration::ZERO,
            password_scheme: PasswordScheme::default(),
        }
    }
}

/// Authenticates users against the stored credential collection and owns the
/// token, expiry and current-user fields.
///
/// Expiry is pull-based: nothing runs in the background. Every read
/// re-validates the session and clears it once `now > expiry`.
#[derive(Clone)]
pub struct SessionManager {
    storage: Storage,
    options: SessionOptions,
}

impl SessionManager {
    pub fn new(storage: Storage) -> Self {
        Self::with_options(storage, SessionOptions::default())
    }

    pub fn with_options(storage: Storage, options: SessionOptions) -> Self {
        Self { storage, options }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    async fn simulate_latency(&self) {
        if !self.options.latency.is_zero() {
            tokio::time::sleep(self.options.latency).await;
        }
    }

    fn next_expiry(&self) -> i64 {
        now_ms().saturating_add(self.options.ttl.num_milliseconds())
    }

    // ===== Credential collection =====

    pub fn credentials(&self) -> AuthResult<Vec<CredentialRecord>> {
        Ok(self.storage.get(USERS_KEY, Vec::new())?)
    }

    fn save_credentials(&self, records: &[CredentialRecord]) -> AuthResult<()> {
        Ok(self.storage.set(USERS_KEY, records)?)
    }

    /// Replace the credential collection with `records`.
    ///
    /// Passwords not yet in the active scheme's stored form are converted
    /// first, so seed files can be written in plaintext. Returns how many were
    /// converted.
    pub fn seed_credentials(&self, mut records: Vec<CredentialRecord>) -> AuthResult<usize> {
        for (i, record) in records.iter().enumerate() {
            if records[..i].iter().any(|r| r.email_matches(&record.email)) {
                return Err(AuthError::EmailInUse(record.email.clone()));
            }
        }

        let scheme = self.options.password_scheme;
        let mut converted = 0;
        for record in records.iter_mut() {
            if !scheme.is_prepared(&record.password) {
                record.password = scheme.prepare(&record.password)?;
                converted += 1;
            }
        }
        self.save_credentials(&records)?;
        info!(count = records.len(), converted, "Seeded credential collection");
        Ok(converted)
    }

    // ===== Session lifecycle =====

    /// Verify `email` (case-insensitive) and `password` (exact) and start a
    /// fresh session, replacing whatever session was stored before.
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.simulate_latency().await;

        let scheme = self.options.password_scheme;
        let records = self.credentials()?;
        let record = records
            .iter()
            .find(|r| r.email_matches(email) && scheme.verify(password, &r.password))
            .ok_or_else(|| {
                warn!(email, "Authentication failed");
                AuthError::InvalidCredentials
            })?;

        let now = now_ms();
        let token = generate_token(now);
        let expires_at = now.saturating_add(self.options.ttl.num_milliseconds());
        let user = SessionUser::from(record);

        self.storage.set(TOKEN_KEY, &token)?;
        self.storage.set(TOKEN_EXPIRY_KEY, &expires_at)?;
        self.storage.set(USER_KEY, &user)?;

        info!(user_id = user.id, email = %user.email, "Session started");
        Ok(Session {
            user,
            token,
            expires_at,
        })
    }

    /// Remove all session fields. Safe to call with no active session.
    pub fn end_session(&self) -> AuthResult<()> {
        self.clear()?;
        info!("Session ended");
        Ok(())
    }

    fn clear(&self) -> AuthResult<()> {
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        self.storage.remove(TOKEN_EXPIRY_KEY)?;
        Ok(())
    }

    /// Load and validate the stored session, clearing it if it has expired or
    /// was only partially written.
    fn read_session(&self) -> AuthResult<Option<Session>> {
        let token = self
            .storage
            .get_opt::<String>(TOKEN_KEY)?
            .filter(|t| !t.is_empty());
        let expiry = self.storage.get_opt::<i64>(TOKEN_EXPIRY_KEY)?;
        let user = self.storage.get_opt::<SessionUser>(USER_KEY)?;

        match (token, expiry, user) {
            (None, None, None) => {
                debug!("No stored session");
                Ok(None)
            }
            (Some(token), Some(expires_at), Some(user)) => {
                if now_ms() > expires_at {
                    warn!(user_id = user.id, expires_at, "Session expired, clearing");
                    self.clear()?;
                    return Ok(None);
                }
                Ok(Some(Session {
                    user,
                    token,
                    expires_at,
                }))
            }
            _ => {
                warn!("Discarding partially written session");
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Check if a session exists and has not expired.
    pub fn is_active(&self) -> AuthResult<bool> {
        Ok(self.read_session()?.is_some())
    }

    pub fn current_session(&self) -> AuthResult<Option<Session>> {
        self.read_session()
    }

    pub fn current_identity(&self) -> AuthResult<Option<SessionUser>> {
        Ok(self.read_session()?.map(|s| s.user))
    }

    pub fn current_token(&self) -> AuthResult<Option<String>> {
        Ok(self.read_session()?.map(|s| s.token))
    }

    /// Push the expiry out to a full TTL from now. The token is kept.
    pub fn extend(&self) -> AuthResult<bool> {
        let Some(session) = self.read_session()? else {
            return Ok(false);
        };
        let expires_at = self.next_expiry();
        self.storage.set(TOKEN_EXPIRY_KEY, &expires_at)?;
        info!(user_id = session.user.id, expires_at, "Session extended");
        Ok(true)
    }

    // ===== Self-service mutation =====

    /// Merge `update` into the current user's credential record and into the
    /// cached identity. `id` and `password` keys are ignored.
    pub async fn update_profile(&self, update: ProfileUpdate) -> AuthResult<SessionUser> {
        self.simulate_latency().await;

        let mut current = self.current_identity()?.ok_or(AuthError::NotAuthenticated)?;
        let mut records = self.credentials()?;

        if let Some(email) = update.email() {
            if records.iter().any(|r| r.id != current.id && r.email_matches(email)) {
                return Err(AuthError::EmailInUse(email.to_string()));
            }
        }

        for record in records.iter_mut().filter(|r| r.id == current.id) {
            record.apply(&update);
        }
        self.save_credentials(&records)?;

        current.apply(&update);
        self.storage.set(USER_KEY, &current)?;

        info!(user_id = current.id, "Profile updated");
        Ok(current)
    }

    /// Replace the current user's password after re-checking the old one
    /// against the stored record.
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> AuthResult<()> {
        self.simulate_latency().await;

        let current = self.current_identity()?.ok_or(AuthError::NotAuthenticated)?;
        let scheme = self.options.password_scheme;
        let mut records = self.credentials()?;

        let record = records
            .iter_mut()
            .find(|r| r.id == current.id)
            .filter(|r| scheme.verify(current_password, &r.password))
            .ok_or_else(|| {
                warn!(user_id = current.id, "Password change rejected");
                AuthError::InvalidCurrentPassword
            })?;
        record.password = scheme.prepare(new_password)?;
        self.save_credentials(&records)?;

        info!(user_id = current.id, "Password changed");
        Ok(())
    }
}
