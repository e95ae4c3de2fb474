use crate::models::Session;
use serde::Deserialize;

/// What the identity provider left in the URL fragment after redirecting back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum OAuthRedirect {
    Session(Session),
    Error(String),
    None,
}

/// Parse an implicit-flow fragment such as
/// `#access_token=..&refresh_token=..&expires_in=3600&token_type=bearer`.
pub(crate) fn parse_oauth_fragment(fragment: &str, now_ms: i64) -> OAuthRedirect {
    let fragment = fragment.trim_start_matches('#');
    if fragment.is_empty() {
        return OAuthRedirect::None;
    }

    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_at = None;
    let mut expires_in = None;
    let mut token_type = None;
    let mut error = None;
    let mut error_description = None;

    for (k, v) in url::form_urlencoded::parse(fragment.as_bytes()) {
        let v = v.into_owned();
        match k.as_ref() {
            "access_token" => access_token = Some(v),
            "refresh_token" => refresh_token = Some(v),
            "expires_at" => expires_at = v.parse::<i64>().ok(),
            "expires_in" => expires_in = v.parse::<i64>().ok(),
            "token_type" => token_type = Some(v),
            "error" => error = Some(v),
            "error_description" => error_description = Some(v),
            _ => {}
        }
    }

    if let Some(e) = error {
        return OAuthRedirect::Error(error_description.filter(|d| !d.is_empty()).unwrap_or(e));
    }

    let Some(access_token) = access_token.filter(|t| !t.is_empty()) else {
        return OAuthRedirect::None;
    };

    OAuthRedirect::Session(Session {
        access_token,
        refresh_token: refresh_token.filter(|t| !t.is_empty()),
        expires_at: expires_at.or_else(|| expires_in.map(|s| now_ms / 1000 + s)),
        token_type: token_type.unwrap_or_else(|| "bearer".to_string()),
    })
}

/// Body of `POST /auth/v1/token?grant_type=refresh_token`.
#[derive(Deserialize, Clone, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn into_session(self, now_ms: i64) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_at
                .or_else(|| self.expires_in.map(|s| now_ms / 1000 + s)),
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_with_tokens() {
        let frag = "#access_token=abc.def&expires_in=3600&refresh_token=r1&token_type=bearer&provider_token=g";
        let OAuthRedirect::Session(s) = parse_oauth_fragment(frag, 1_000_000) else {
            panic!("expected a session");
        };
        assert_eq!(s.access_token, "abc.def");
        assert_eq!(s.refresh_token.as_deref(), Some("r1"));
        assert_eq!(s.expires_at, Some(1_000 + 3600));
        assert_eq!(s.token_type, "bearer");
    }

    #[test]
    fn test_fragment_expires_at_wins() {
        let frag = "access_token=a&expires_at=1700000000&expires_in=10";
        let OAuthRedirect::Session(s) = parse_oauth_fragment(frag, 0) else {
            panic!("expected a session");
        };
        assert_eq!(s.expires_at, Some(1_700_000_000));
    }

    #[test]
    fn test_fragment_error_is_decoded() {
        let frag = "#error=access_denied&error_description=User+cancelled%20sign-in";
        assert_eq!(
            parse_oauth_fragment(frag, 0),
            OAuthRedirect::Error("User cancelled sign-in".to_string())
        );

        assert_eq!(
            parse_oauth_fragment("#error=server_error", 0),
            OAuthRedirect::Error("server_error".to_string())
        );
    }

    #[test]
    fn test_fragment_without_tokens() {
        assert_eq!(parse_oauth_fragment("", 0), OAuthRedirect::None);
        assert_eq!(parse_oauth_fragment("#", 0), OAuthRedirect::None);
        assert_eq!(parse_oauth_fragment("#section-2", 0), OAuthRedirect::None);
        assert_eq!(parse_oauth_fragment("#access_token=", 0), OAuthRedirect::None);
    }

    #[test]
    fn test_token_response_contract_deserialize() {
        let json = r#"{
            "access_token": "new-jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r2",
            "user": {"id": "u-1"}
        }"#;
        let parsed: TokenResponse = serde_json::from_str(json).expect("token response should parse");
        let s = parsed.into_session(2_000);
        assert_eq!(s.access_token, "new-jwt");
        assert_eq!(s.refresh_token.as_deref(), Some("r2"));
        assert_eq!(s.expires_at, Some(2 + 3600));
    }
}
