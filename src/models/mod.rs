use serde::{Deserialize, Deserializer, Serialize};

/// Prefix for locally generated ids that stand in for a row the backend
/// has not confirmed yet.
pub(crate) const PLACEHOLDER_PREFIX: &str = "tmp-";

/// A row of the `bookmarks` table.
///
/// `created_at` and `user_id` are server-assigned and stay `None` on
/// optimistic placeholders.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Bookmark {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Bookmark {
    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_PREFIX)
    }
}

/// Insert payload. The owner column is checked by row-level security, so it
/// must match the signed-in identity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct NewBookmark {
    pub title: String,
    pub url: String,
    pub user_id: String,
}

/// The authenticated user as returned by `GET /auth/v1/user`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl Identity {
    /// Best human-readable label for the header.
    pub fn display_name(&self) -> String {
        let meta = |k: &str| {
            self.user_metadata
                .get(k)
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.to_string())
        };

        meta("full_name")
            .or_else(|| meta("name"))
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Tokens issued by the identity service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(exp) => exp.saturating_mul(1000) <= now_ms,
            None => false,
        }
    }
}

// Row ids are uuid strings on some deployments and bigint identities on others.
fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bookmark_row_with_uuid_id() {
        let json = r#"{
            "id": "5f0c6a1e-0000-4000-8000-000000000001",
            "title": "Docs",
            "url": "https://docs.rs",
            "created_at": "2026-01-02T03:04:05.000000+00:00",
            "user_id": "u-1"
        }"#;
        let b: Bookmark = serde_json::from_str(json).expect("row should parse");
        assert_eq!(b.id, "5f0c6a1e-0000-4000-8000-000000000001");
        assert_eq!(b.user_id.as_deref(), Some("u-1"));
        assert!(!b.is_placeholder());
    }

    #[test]
    fn test_bookmark_row_with_numeric_id() {
        let json = r#"{"id": 42, "title": "Crates", "url": "https://crates.io"}"#;
        let b: Bookmark = serde_json::from_str(json).expect("row should parse");
        assert_eq!(b.id, "42");
        assert!(b.created_at.is_none());
    }

    #[test]
    fn test_bookmark_row_rejects_object_id() {
        let json = r#"{"id": {"x": 1}, "title": "t", "url": "https://a.b"}"#;
        assert!(serde_json::from_str::<Bookmark>(json).is_err());
    }

    #[test]
    fn test_identity_display_name_prefers_metadata() {
        let id: Identity = serde_json::from_str(
            r#"{"id": "u-1", "email": "ada@example.com", "user_metadata": {"full_name": "Ada"}}"#,
        )
        .expect("identity should parse");
        assert_eq!(id.display_name(), "Ada");

        let bare: Identity = serde_json::from_str(r#"{"id": "u-2"}"#).expect("parse");
        assert_eq!(bare.display_name(), "u-2");
    }

    #[test]
    fn test_session_expiry() {
        let s = Session {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: Some(100),
            token_type: "bearer".to_string(),
        };
        assert!(!s.is_expired(99_999));
        assert!(s.is_expired(100_000));

        let open_ended = Session { expires_at: None, ..s };
        assert!(!open_ended.is_expired(i64::MAX));
    }
}
