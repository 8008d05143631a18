use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys `update_profile` never merges. Ids are immutable and passwords
/// change only through `change_password`.
pub const RESERVED_PROFILE_KEYS: [&str; 2] = ["id", "password"];

/// A stored user entry, including its login secret.
///
/// Passwords are kept as whatever the active `PasswordScheme` stores: the
/// literal password under `Plaintext`, a PHC string under `Argon2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: i64,
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl CredentialRecord {
    pub fn new(id: i64, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            password: password.into(),
            profile: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.profile.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive email comparison.
    pub fn email_matches(&self, email: &str) -> bool {
        self.email.to_lowercase() == email.to_lowercase()
    }

    /// Merge a profile update into this record.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(email) = update.email() {
            self.email = email.to_string();
        }
        for (key, value) in update.profile_fields() {
            self.profile.insert(key.clone(), value.clone());
        }
    }
}

/// The identity cached for the active session: a credential record without
/// its password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub email: String,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl SessionUser {
    /// Convenience accessor for a string profile field such as `name`.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.profile.get(key).and_then(Value::as_str)
    }

    pub fn display_name(&self) -> &str {
        self.field_str("name").unwrap_or(&self.email)
    }

    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(email) = update.email() {
            self.email = email.to_string();
        }
        for (key, value) in update.profile_fields() {
            self.profile.insert(key.clone(), value.clone());
        }
    }
}

impl From<CredentialRecord> for SessionUser {
    fn from(record: CredentialRecord) -> Self {
        let CredentialRecord { id, email, profile, .. } = record;
        Self { id, email, profile }
    }
}

impl From<&CredentialRecord> for SessionUser {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            profile: record.profile.clone(),
        }
    }
}

/// A partial set of profile fields to merge into the current user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileUpdate(pub Map<String, Value>);

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// The new email, if the update carries a string `email`.
    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    /// Fields to merge into the flattened profile, skipping `email` and the
    /// reserved keys.
    pub fn profile_fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0
            .iter()
            .filter(|(key, _)| key.as_str() != "email" && !RESERVED_PROFILE_KEYS.contains(&key.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.profile_fields().next().is_none() && self.email().is_none()
    }
}

impl From<Map<String, Value>> for ProfileUpdate {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_round_trips_extra_fields() {
        let raw = json!({
            "id": 7,
            "email": "ops@example.org",
            "password": "secret",
            "name": "Ops",
            "role": "admin"
        });
        let record: CredentialRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.profile.get("role"), Some(&json!("admin")));
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn test_session_user_drops_password() {
        let record = CredentialRecord::new(1, "a@b.com", "pw1").with_field("name", "A");
        let user = SessionUser::from(&record);
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value.get("name"), Some(&json!("A")));
        assert_eq!(user.display_name(), "A");
    }

    #[test]
    fn test_email_matches_ignores_case() {
        let record = CredentialRecord::new(1, "Admin@Example.com", "pw");
        assert!(record.email_matches("admin@example.COM"));
        assert!(!record.email_matches("admin@example.org"));
    }

    #[test]
    fn test_apply_skips_reserved_keys() {
        let mut record = CredentialRecord::new(1, "a@b.com", "pw1");
        let update = ProfileUpdate::new()
            .set("id", 99)
            .set("password", "hijack")
            .set("name", "X")
            .set("email", "new@b.com");

        record.apply(&update);
        assert_eq!(record.id, 1);
        assert_eq!(record.password, "pw1");
        assert_eq!(record.email, "new@b.com");
        assert_eq!(record.profile.get("name"), Some(&json!("X")));
        assert!(!record.profile.contains_key("password"));
    }

    #[test]
    fn test_update_with_only_reserved_keys_is_empty() {
        assert!(ProfileUpdate::new().set("id", 3).is_empty());
        assert!(!ProfileUpdate::new().set("phone", "555").is_empty());
    }
}
