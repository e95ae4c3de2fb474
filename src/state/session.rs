use crate::api::{parse_oauth_fragment, ApiClient, ApiError, ApiResult, OAuthRedirect};
use crate::models::Identity;
use crate::state::bookmarks::reload_bookmarks;
use crate::state::{AppState, BootstrapState};
use crate::util::now_ms;
use leptos::logging::{log, warn};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::future::Future;
use wasm_bindgen::JsValue;

/// Resolve who is signed in and load their bookmarks. Runs once per page load;
/// later calls are ignored.
pub(crate) fn bootstrap(app: AppState) {
    if app.bootstrap.get_untracked() != BootstrapState::Idle {
        return;
    }
    app.bootstrap.set(BootstrapState::Running);

    let mut api_client = app.api_client.get_untracked();
    match take_oauth_redirect() {
        OAuthRedirect::Session(session) => {
            log!("[session] signed in via provider redirect");
            api_client.set_session(session);
            api_client.save_to_storage();
        }
        OAuthRedirect::Error(e) => {
            warn!("[session] provider sign-in failed: {e}");
            app.auth_error.set(Some(e));
        }
        OAuthRedirect::None => {}
    }

    if !api_client.is_authenticated() {
        app.api_client.set(api_client);
        app.bootstrap.set(BootstrapState::Done);
        return;
    }

    spawn_local(async move {
        let result = resolve_identity(&mut api_client).await;

        match result {
            Ok(identity) => {
                log!("[session] signed in as {}", identity.id);
                app.api_client.set(api_client);
                app.identity.set(Some(identity));
                reload_bookmarks(app);
            }
            Err(e) if e.is_unauthorized() => {
                log!("[session] stored session rejected");
                api_client.logout();
                app.api_client.set(api_client);
            }
            Err(e) => {
                // Keep the stored session; the next load can try again.
                warn!("[session] could not resolve identity: {e}");
                app.api_client.set(api_client);
            }
        }
        app.bootstrap.set(BootstrapState::Done);
    });
}

/// `getUser`, refreshing the access token once if it is expired or rejected.
async fn resolve_identity(api_client: &mut ApiClient) -> ApiResult<Identity> {
    let expired = api_client
        .session()
        .map(|s| s.is_expired(now_ms()))
        .unwrap_or(false);

    if !expired {
        match api_client.get_user().await {
            Err(e) if e.is_unauthorized() => {}
            other => return other,
        }
    }

    let session = api_client.refresh_session().await?;
    api_client.set_session(session);
    api_client.save_to_storage();
    api_client.get_user().await
}

/// What to do after a call was rejected with `stale` as its access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Renewal {
    /// The app still holds that token: trade the refresh token for a new one.
    Refresh,
    /// Another call already refreshed; retry with the current token.
    Reuse,
    SignedOut,
}

pub(crate) fn renewal_for(current: Option<&str>, stale: &str) -> Renewal {
    match current {
        None => Renewal::SignedOut,
        Some(token) if token == stale => Renewal::Refresh,
        Some(_) => Renewal::Reuse,
    }
}

/// Refresh the access token in the middle of a session and publish the new
/// one to the client signal and storage. Live sync rejoins through the token
/// memo in `App`.
pub(crate) async fn renew_session(app: AppState, stale_token: &str) -> ApiResult<ApiClient> {
    let mut api_client = app.api_client.get_untracked();
    let current = api_client.session().map(|s| s.access_token.as_str());

    match renewal_for(current, stale_token) {
        Renewal::SignedOut => return Err(ApiError::unauthorized()),
        Renewal::Reuse => return Ok(api_client),
        Renewal::Refresh => {}
    }

    let session = api_client.refresh_session().await?;

    // Signed out while the refresh was in flight: do not bring the session back.
    if app.identity.with_untracked(|i| i.is_none()) {
        return Err(ApiError::unauthorized());
    }

    log!("[session] access token refreshed");
    api_client.set_session(session);
    api_client.save_to_storage();
    app.api_client.set(api_client.clone());
    Ok(api_client)
}

/// Run `call` with the current client. On `Unauthorized` the token is renewed
/// once and the call retried; if renewal fails the original error is returned.
pub(crate) async fn call_with_renewal<T, F, Fut>(app: AppState, call: F) -> ApiResult<T>
where
    F: Fn(ApiClient) -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let api_client = app.api_client.get_untracked();
    let used = api_client
        .session()
        .map(|s| s.access_token.clone())
        .unwrap_or_default();

    match call(api_client).await {
        Err(e) if e.is_unauthorized() => match renew_session(app, &used).await {
            Ok(fresh) => call(fresh).await,
            Err(refresh_err) => {
                warn!("[session] token refresh failed: {refresh_err}");
                Err(e)
            }
        },
        other => other,
    }
}

/// Pull tokens (or an error) out of the URL fragment and scrub the address bar.
fn take_oauth_redirect() -> OAuthRedirect {
    let location = window().location();
    let hash = location.hash().unwrap_or_default();
    let parsed = parse_oauth_fragment(&hash, now_ms());

    if parsed != OAuthRedirect::None {
        let clean = format!(
            "{}{}",
            location.pathname().unwrap_or_default(),
            location.search().unwrap_or_default()
        );
        if let Ok(history) = window().history() {
            let _ = history.replace_state_with_url(&JsValue::NULL, "", Some(&clean));
        }
    }
    parsed
}

/// Hand the browser to the identity provider. It comes back to this origin
/// with tokens in the fragment, which `bootstrap` picks up.
pub(crate) fn sign_in(app: AppState) {
    let api_client = app.api_client.get_untracked();
    let origin = window().location().origin().unwrap_or_default();
    let target = api_client.authorize_url(app.auth_provider, &origin);

    app.auth_error.set(None);
    if let Err(e) = window().location().set_href(&target) {
        warn!("[session] redirect failed: {e:?}");
        app.auth_error.set(Some("Could not reach the sign-in page".to_string()));
    }
}

/// Drop local state right away; revoke the remote session in the background.
pub(crate) fn sign_out(app: AppState) {
    let remote = app.api_client.get_untracked();
    clear_local_session(app);

    spawn_local(async move {
        if let Err(e) = remote.sign_out().await {
            warn!("[session] remote sign-out failed: {e}");
        }
    });
}

/// The backend no longer accepts our token.
pub(crate) fn expire_session(app: AppState) {
    warn!("[session] session expired");
    clear_local_session(app);
}

fn clear_local_session(app: AppState) {
    let mut api_client = app.api_client.get_untracked();
    api_client.logout();
    app.api_client.set(api_client);

    app.identity.set(None);
    app.bookmarks.update(|l| l.clear());
    app.title_input.set(String::new());
    app.url_input.set(String::new());
    app.search_query.set(String::new());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renewal_refreshes_only_the_rejected_token() {
        assert_eq!(renewal_for(Some("t1"), "t1"), Renewal::Refresh);
        // A concurrent call already swapped in a new token.
        assert_eq!(renewal_for(Some("t2"), "t1"), Renewal::Reuse);
        assert_eq!(renewal_for(None, "t1"), Renewal::SignedOut);
    }
}
