use thiserror::Error;

/// Failures raised by a key-value backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid stored value for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Keychain error for key '{key}': {message}")]
    Keyring { key: String, message: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Current password is incorrect")]
    InvalidCurrentPassword,

    #[error("Email already in use: {0}")]
    EmailInUse(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// True for errors a user can fix by retrying with different input.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::NotAuthenticated
                | AuthError::InvalidCurrentPassword
                | AuthError::EmailInUse(_)
        )
    }
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_console_wording() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "Invalid email or password");
        assert_eq!(AuthError::NotAuthenticated.to_string(), "User not authenticated");
        assert_eq!(
            AuthError::InvalidCurrentPassword.to_string(),
            "Current password is incorrect"
        );
    }

    #[test]
    fn test_storage_errors_are_not_user_errors() {
        let err: AuthError = StorageError::Unavailable("lock poisoned".to_string()).into();
        assert!(!err.is_user_error());
        assert!(AuthError::InvalidCredentials.is_user_error());
        assert_eq!(err.to_string(), "Storage unavailable: lock poisoned");
    }
}
