use crate::pages::RootPage;
use crate::state::live_sync::resync_live;
use crate::state::session::bootstrap;
use crate::state::{AppContext, AppState};
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::path;

#[component]
pub fn App() -> impl IntoView {
    let app = AppState::new();
    provide_context(AppContext(app));

    bootstrap(app);

    // One change subscription per signed-in identity, rejoined when the token
    // is refreshed; each change reloads the list.
    let access_token = Memo::new(move |_| {
        app.api_client
            .with(|c| c.session().map(|s| s.access_token.clone()))
    });
    Effect::new(move |_| {
        app.identity.track();
        access_token.track();
        resync_live(app);
    });
    on_cleanup(move || app.live_sync.close());

    // IMPORTANT:
    // - Leptos CSR requires the `csr` feature on `leptos`.
    // - router hooks require a <Router> context.
    view! {
        <Router>
            <Routes fallback=|| view! { <div class="px-4 py-8 text-xs text-gray-500">"Not found"</div> }>
                <Route path=path!("") view=RootPage />
            </Routes>
        </Router>
    }
}
