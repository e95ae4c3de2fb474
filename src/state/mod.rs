pub(crate) mod bookmarks;
pub(crate) mod live_sync;
pub(crate) mod search;
pub(crate) mod session;

use crate::api::{ApiClient, AuthProvider, EnvConfig};
use crate::models::Identity;
use bookmarks::BookmarkList;
use leptos::logging::warn;
use leptos::prelude::*;
use live_sync::LiveSync;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BootstrapState {
    Idle,
    Running,
    Done,
}

#[derive(Clone, Copy)]
pub(crate) struct AppState {
    pub api_client: RwSignal<ApiClient>,
    pub auth_provider: AuthProvider,

    /// `None` means signed out; everything below is gated on it.
    pub identity: RwSignal<Option<Identity>>,
    pub bootstrap: RwSignal<BootstrapState>,
    pub auth_error: RwSignal<Option<String>>,

    pub bookmarks: RwSignal<BookmarkList>,
    /// Reload guard: only the latest request may write the list.
    pub reload_request_id: RwSignal<u64>,

    /// Add form and search box.
    pub title_input: RwSignal<String>,
    pub url_input: RwSignal<String>,
    pub search_query: RwSignal<String>,

    pub live_sync: LiveSync,
}

impl AppState {
    pub fn new() -> Self {
        let config = EnvConfig::new();

        Self {
            api_client: RwSignal::new(ApiClient::load_from_storage(&config)),
            auth_provider: config.auth_provider,
            identity: RwSignal::new(None),
            bootstrap: RwSignal::new(BootstrapState::Idle),
            auth_error: RwSignal::new(None),
            bookmarks: RwSignal::new(BookmarkList::default()),
            reload_request_id: RwSignal::new(0),
            title_input: RwSignal::new(String::new()),
            url_input: RwSignal::new(String::new()),
            search_query: RwSignal::new(String::new()),
            live_sync: LiveSync::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);

/// Blocking alert for a failed mutation.
pub(crate) fn notify_failure(message: &str) {
    if let Err(e) = window().alert_with_message(message) {
        warn!("alert failed ({message}): {e:?}");
    }
}
