pub(crate) mod auth;
pub(crate) mod config;

pub(crate) use auth::{parse_oauth_fragment, OAuthRedirect};
pub(crate) use config::{AuthProvider, EnvConfig};

use crate::models::{Bookmark, Identity, NewBookmark, Session};
use crate::storage::{clear_session_storage, load_session_from_storage, save_session_to_storage};
use auth::TokenResponse;
use reqwest::Method;

const BOOKMARKS_TABLE: &str = "/rest/v1/bookmarks";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
    Config,
}

#[derive(Clone, Debug)]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ApiError {
    fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    pub(crate) fn unauthorized() -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: "Unauthorized".to_string(),
        }
    }

    fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }

    fn config(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Config,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

/// Client for the hosted backend: auth endpoints plus the `bookmarks` table.
///
/// Cheap to clone; callers take a copy out of the signal, await on it, and
/// write it back when the session changed.
#[derive(Clone, Debug)]
pub(crate) struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) anon_key: String,
    pub(crate) session: Option<Session>,
}

impl ApiClient {
    pub fn new(base_url: String, anon_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            session: None,
        }
    }

    pub fn from_config(config: &EnvConfig) -> Self {
        Self::new(config.supabase_url.clone(), config.anon_key.clone())
    }

    pub fn load_from_storage(config: &EnvConfig) -> Self {
        let mut client = Self::from_config(config);
        client.session = load_session_from_storage();
        client
    }

    pub fn save_to_storage(&self) {
        if let Some(session) = &self.session {
            save_session_to_storage(session);
        }
    }

    pub fn clear_storage() {
        clear_session_storage();
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn logout(&mut self) {
        self.session = None;
        Self::clear_storage();
    }

    /// Without a session, requests go out under the public anon key.
    fn bearer(&self) -> &str {
        self.session
            .as_ref()
            .map(|s| s.access_token.as_str())
            .unwrap_or(self.anon_key.as_str())
    }

    fn with_auth_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer()))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        prefer: Option<&str>,
    ) -> ApiResult<reqwest::Response> {
        let client = reqwest::Client::new();
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.with_auth_headers(client.request(method, url));

        if let Some(p) = prefer {
            req = req.header("Prefer", p);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let res = req.send().await.map_err(ApiError::network)?;

        if res.status().is_success() {
            Ok(res)
        } else if res.status().as_u16() == 401 {
            Err(ApiError::unauthorized())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::http(status, body, "Request failed"))
        }
    }

    async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        prefer: Option<&str>,
    ) -> ApiResult<T> {
        self.send(method, path, body, prefer)
            .await?
            .json()
            .await
            .map_err(ApiError::parse)
    }

    /// Where to send the browser to start the provider's sign-in flow.
    pub fn authorize_url(&self, provider: AuthProvider, redirect_to: &str) -> String {
        format!(
            "{}/auth/v1/authorize?provider={}&redirect_to={}",
            self.base_url,
            provider.as_ref(),
            urlencoding::encode(redirect_to)
        )
    }

    pub async fn get_user(&self) -> ApiResult<Identity> {
        if self.session.is_none() {
            return Err(ApiError::unauthorized());
        }
        self.request_json(Method::GET, "/auth/v1/user", None, None)
            .await
    }

    pub async fn refresh_session(&self) -> ApiResult<Session> {
        let Some(refresh_token) = self.session.as_ref().and_then(|s| s.refresh_token.clone())
        else {
            return Err(ApiError::unauthorized());
        };

        let res: TokenResponse = self
            .request_json(
                Method::POST,
                "/auth/v1/token?grant_type=refresh_token",
                Some(&serde_json::json!({ "refresh_token": refresh_token })),
                None,
            )
            .await?;
        Ok(res.into_session(crate::util::now_ms()))
    }

    /// Revokes the session server-side. Local state is the caller's concern.
    pub async fn sign_out(&self) -> ApiResult<()> {
        if self.session.is_none() {
            return Ok(());
        }
        self.send(Method::POST, "/auth/v1/logout", None, None)
            .await
            .map(|_| ())
    }

    /// All rows visible to the current identity, newest first.
    pub async fn select_bookmarks(&self) -> ApiResult<Vec<Bookmark>> {
        self.request_json(
            Method::GET,
            &format!("{BOOKMARKS_TABLE}?select=*&order=created_at.desc"),
            None,
            None,
        )
        .await
    }

    pub async fn insert_bookmark(&self, record: &NewBookmark) -> ApiResult<Bookmark> {
        let rows: Vec<Bookmark> = self
            .request_json(
                Method::POST,
                BOOKMARKS_TABLE,
                Some(&serde_json::json!([record])),
                Some("return=representation"),
            )
            .await?;
        Self::parse_inserted_rows(rows)
    }

    pub async fn delete_bookmark(&self, id: &str) -> ApiResult<()> {
        self.send(
            Method::DELETE,
            &format!("{BOOKMARKS_TABLE}?id=eq.{}", urlencoding::encode(id)),
            None,
            None,
        )
        .await
        .map(|_| ())
    }

    pub(crate) fn parse_inserted_rows(rows: Vec<Bookmark>) -> ApiResult<Bookmark> {
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::parse("Insert succeeded but returned no row"))
    }

    /// WebSocket endpoint of the change-notification service.
    pub fn realtime_url(&self) -> ApiResult<String> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| ApiError::config(format!("Invalid backend url: {e}")))?;

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(ApiError::config(format!(
                    "Unsupported backend scheme: {other}"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ApiError::config("Cannot derive websocket url"))?;
        url.set_path("/realtime/v1/websocket");
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", "1.0.0");
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: Some("r".to_string()),
            expires_at: None,
            token_type: "bearer".to_string(),
        }
    }

    #[test]
    fn test_api_client_new_trims_base_url() {
        let client = ApiClient::new("https://abc.supabase.co/".to_string(), "anon".to_string());
        assert_eq!(client.base_url, "https://abc.supabase.co");
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_bearer_falls_back_to_anon_key() {
        let mut client = ApiClient::new("http://localhost:54321".to_string(), "anon".to_string());
        assert_eq!(client.bearer(), "anon");

        client.set_session(session("user-jwt"));
        assert_eq!(client.bearer(), "user-jwt");
        assert!(client.is_authenticated());
    }

    #[test]
    fn test_authorize_url_encodes_redirect() {
        let client = ApiClient::new("https://abc.supabase.co".to_string(), "anon".to_string());
        assert_eq!(
            client.authorize_url(AuthProvider::Google, "https://app.example.com"),
            "https://abc.supabase.co/auth/v1/authorize?provider=google&redirect_to=https%3A%2F%2Fapp.example.com"
        );
    }

    #[test]
    fn test_realtime_url_switches_scheme() {
        let secure = ApiClient::new("https://abc.supabase.co".to_string(), "k".to_string());
        assert_eq!(
            secure.realtime_url().expect("url"),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=k&vsn=1.0.0"
        );

        let local = ApiClient::new("http://localhost:54321".to_string(), "k".to_string());
        assert_eq!(
            local.realtime_url().expect("url"),
            "ws://localhost:54321/realtime/v1/websocket?apikey=k&vsn=1.0.0"
        );
    }

    #[test]
    fn test_realtime_url_rejects_bad_base() {
        let client = ApiClient::new("not a url".to_string(), "k".to_string());
        let err = client.realtime_url().expect_err("should fail");
        assert_eq!(err.kind, ApiErrorKind::Config);
    }

    #[test]
    fn test_insert_response_contract() {
        let json = r#"[{
            "id": "b-1",
            "title": "Docs",
            "url": "https://docs.rs",
            "created_at": "2026-10-18T10:00:00+00:00",
            "user_id": "u-1"
        }]"#;
        let rows: Vec<Bookmark> = serde_json::from_str(json).expect("rows should parse");
        let b = ApiClient::parse_inserted_rows(rows).expect("one row");
        assert_eq!(b.id, "b-1");

        let err = ApiClient::parse_inserted_rows(vec![]).expect_err("empty should fail");
        assert_eq!(err.kind, ApiErrorKind::Parse);
    }

    #[test]
    fn test_insert_request_serialization() {
        let record = NewBookmark {
            title: "Docs".to_string(),
            url: "https://docs.rs".to_string(),
            user_id: "u-1".to_string(),
        };
        let v = serde_json::json!([record]);
        assert_eq!(v[0]["title"], "Docs");
        assert_eq!(v[0]["user_id"], "u-1");
        assert!(v[0].get("id").is_none());
    }

    #[test]
    fn test_error_display_is_message() {
        let e = ApiError::unauthorized();
        assert_eq!(e.to_string(), "Unauthorized");
        assert!(e.is_unauthorized());
    }
}
