use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identity as reported by the auth provider (not the `user_profiles` row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata.get("full_name").and_then(Value::as_str)
    }

    pub fn avatar_url(&self) -> Option<&str> {
        self.user_metadata.get("avatar_url").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now.timestamp() >= at,
            None => false,
        }
    }

    /// Fill `expires_at` from `expires_in` when the provider only sent the latter
    pub fn stamp_expiry(mut self, now: DateTime<Utc>) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now.timestamp() + secs);
        }
        self
    }
}

/// Result of a credential exchange. Sign-up can yield a user without a session
/// while e-mail confirmation is pending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthResponse {
    pub user: Option<AuthUser>,
    pub session: Option<Session>,
}

impl AuthResponse {
    pub fn from_session(session: Session) -> Self {
        Self {
            user: Some(session.user.clone()),
            session: Some(session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_session_expiry_from_expires_in() {
        let now = Utc::now();
        let session: Session = serde_json::from_value(json!({
            "access_token": "token",
            "expires_in": 3600,
            "user": {"id": Uuid::new_v4(), "email": "ana@example.com"}
        }))
        .unwrap();
        assert_eq!(session.token_type, "bearer");

        let session = session.stamp_expiry(now);
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::seconds(3600)));
    }

    #[test]
    fn test_metadata_accessors() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": Uuid::new_v4(),
            "user_metadata": {"full_name": "Ana Lima"}
        }))
        .unwrap();
        assert_eq!(user.full_name(), Some("Ana Lima"));
        assert_eq!(user.avatar_url(), None);
        assert_eq!(user.email, None);
    }
}
