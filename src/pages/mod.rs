use crate::components::ui::{
    Alert, AlertDescription, Button, ButtonSize, ButtonVariant, Input, Spinner,
};
use crate::models::Bookmark;
use crate::realtime::LiveStatus;
use crate::state::bookmarks::{add_bookmark, remove_bookmark};
use crate::state::live_sync::reconnect_live;
use crate::state::search::filter_bookmarks;
use crate::state::session::{sign_in, sign_out};
use crate::state::{AppContext, BootstrapState};
use crate::util::favicon_url;
use icons::{Bookmark as BookmarkIcon, Search, X};
use leptos::prelude::*;

#[component]
pub fn SignInPage() -> impl IntoView {
    let app = expect_context::<AppContext>().0;
    let checking = move || app.bootstrap.get() != BootstrapState::Done;
    let label = format!("Continue with {}", app.auth_provider.label());

    view! {
        <div class="min-h-screen flex items-center justify-center bg-[#050505] relative overflow-hidden text-white">
            <div class="absolute top-[-10%] left-[-10%] w-[50%] h-[50%] bg-blue-600/10 rounded-full blur-[120px] animate-pulse" />
            <div class="absolute bottom-[-10%] right-[-10%] w-[50%] h-[50%] bg-purple-600/10 rounded-full blur-[120px] animate-pulse" />

            <div class="relative z-10 w-full max-w-md px-6 text-center">
                <div class="bg-[#111111]/70 backdrop-blur-2xl border border-white/10 p-10 rounded-[3rem] shadow-2xl">
                    <div class="mb-8 flex justify-center">
                        <div class="w-20 h-20 bg-gradient-to-br from-blue-500 to-indigo-600 rounded-3xl flex items-center justify-center shadow-[0_0_40px_rgba(59,130,246,0.4)]">
                            <BookmarkIcon class="size-10 text-white" />
                        </div>
                    </div>
                    <h1 class="text-4xl font-bold mb-3 tracking-tighter">"Smart Bookmark"</h1>
                    <p class="text-gray-400 mb-10 text-sm font-medium">
                        "Your digital collection, elegantly organized."
                    </p>

                    <Show when=move || app.auth_error.get().is_some() fallback=|| ().into_view()>
                        {move || {
                            app.auth_error.get().map(|e| view! {
                                <Alert class="mb-6">
                                    <AlertDescription>{e}</AlertDescription>
                                </Alert>
                            })
                        }}
                    </Show>

                    <Button
                        variant=ButtonVariant::Light
                        size=ButtonSize::Wide
                        attr:disabled=checking
                        on:click=move |_| sign_in(app)
                    >
                        <Show when=checking fallback=|| ().into_view()>
                            <Spinner />
                        </Show>
                        {label}
                    </Button>
                </div>
            </div>
        </div>
    }
}

#[component]
fn BookmarkTile(bookmark: Bookmark, on_delete: Callback<String>) -> impl IntoView {
    let icon = favicon_url(&bookmark.url);
    let id = bookmark.id.clone();

    // Unconfirmed rows have no server id to delete yet.
    let delete_button = (!bookmark.is_placeholder()).then(|| {
        view! {
            <Button
                variant=ButtonVariant::Destructive
                size=ButtonSize::Icon
                class="absolute -top-3 -right-3 z-20 opacity-0 group-hover:opacity-100"
                attr:aria-label="Delete bookmark"
                on:click=move |_| on_delete.run(id.clone())
            >
                <X class="size-4" />
            </Button>
        }
    });

    let tile_class = if bookmark.is_placeholder() {
        "group flex flex-col items-center gap-5 opacity-60"
    } else {
        "group flex flex-col items-center gap-5 transition-all duration-500"
    };

    view! {
        <div class=tile_class>
            <div class="relative">
                {delete_button}
                <a
                    href=bookmark.url.clone()
                    target="_blank"
                    rel="noopener noreferrer"
                    class="block w-24 h-24 bg-[#121212] rounded-[2.5rem] border border-white/5 flex items-center justify-center group-hover:border-blue-500/40 group-hover:-translate-y-3 transition-all p-5 relative overflow-hidden"
                >
                    <img
                        src=icon
                        alt=bookmark.title.clone()
                        class="w-full h-full object-contain filter drop-shadow-xl"
                    />
                </a>
            </div>
            <span class="text-[14px] font-semibold text-gray-500 group-hover:text-white transition-colors truncate w-full text-center px-2">
                {bookmark.title.clone()}
            </span>
        </div>
    }
}

#[component]
pub fn DashboardPage() -> impl IntoView {
    let app = expect_context::<AppContext>().0;

    let visible = Memo::new(move |_| {
        let query = app.search_query.get();
        app.bookmarks.with(|l| filter_bookmarks(l.items(), &query))
    });
    let total = move || app.bookmarks.with(|l| l.len());
    let user_label = move || {
        app.identity
            .with(|i| i.as_ref().map(|i| i.display_name()))
            .unwrap_or_default()
    };

    let live_lost = move || app.live_sync.status.get() == LiveStatus::Lost;

    let on_add = Callback::new(move |_: ()| add_bookmark(app));
    let on_delete = Callback::new(move |id: String| remove_bookmark(app, id));

    view! {
        <div class="min-h-screen bg-[#050505] text-white p-6 md:p-12 selection:bg-blue-500/30">
            <div class="max-w-6xl mx-auto relative z-10">
                <header class="flex flex-col md:flex-row justify-between items-start md:items-center gap-6 mb-16">
                    <div>
                        <h1 class="text-5xl font-extrabold tracking-tighter bg-gradient-to-r from-white via-white to-gray-500 bg-clip-text text-transparent">
                            "Collection"
                        </h1>
                        <p class="text-gray-500 text-sm mt-2 font-mono uppercase tracking-widest">
                            {move || format!("{} saved resources", total())}
                        </p>
                        <p class="text-gray-600 text-xs mt-1">{user_label}</p>
                        <Show when=live_lost fallback=|| ().into_view()>
                            <p class="text-amber-500/80 text-xs mt-1 flex items-center gap-2">
                                "Live updates paused."
                                <button
                                    class="underline hover:text-amber-400"
                                    on:click=move |_| reconnect_live(app)
                                >
                                    "Reconnect"
                                </button>
                            </p>
                        </Show>
                    </div>

                    <div class="flex items-center gap-4 w-full md:w-auto">
                        <div class="relative flex-1 md:w-64">
                            <Input
                                placeholder="Search bookmarks..."
                                bind_value=app.search_query
                                class="rounded-full border border-white/10 py-2 px-10 text-sm"
                            />
                            <Search class="absolute left-4 top-2.5 size-4 text-gray-500" />
                        </div>
                        <Button
                            variant=ButtonVariant::Outline
                            size=ButtonSize::Pill
                            on:click=move |_| sign_out(app)
                        >
                            "Logout"
                        </Button>
                    </div>
                </header>

                <div class="relative mb-24 group">
                    <div class="absolute -inset-1 bg-gradient-to-r from-blue-600/20 to-purple-600/20 rounded-[2.5rem] blur-xl opacity-0 group-hover:opacity-100 transition duration-1000"></div>
                    <div class="relative bg-[#111111]/80 backdrop-blur-xl p-3 md:p-4 rounded-[2.5rem] border border-white/10 flex flex-col md:flex-row gap-3 shadow-2xl">
                        <Input
                            placeholder="Label (e.g. Portfolio)"
                            bind_value=app.title_input
                            on_enter=on_add
                            class="rounded-2xl p-4 flex-1 text-lg"
                        />
                        <div class="hidden md:block w-[1px] h-10 bg-white/5 self-center"></div>
                        <Input
                            placeholder="Paste link address..."
                            bind_value=app.url_input
                            on_enter=on_add
                            class="rounded-2xl p-4 flex-grow-[2] text-lg"
                        />
                        <Button on:click=move |_| on_add.run(())>"Add Item"</Button>
                    </div>
                </div>

                <Show
                    when=move || visible.with(|v| !v.is_empty())
                    fallback=|| view! {
                        <div class="py-20 text-center border border-dashed border-white/10 rounded-[3rem]">
                            <p class="text-gray-600 font-medium">"No bookmarks found."</p>
                        </div>
                    }
                >
                    <div class="grid grid-cols-2 sm:grid-cols-3 md:grid-cols-4 lg:grid-cols-5 xl:grid-cols-6 gap-y-16 gap-x-10">
                        <For
                            each=move || visible.get()
                            key=|b: &Bookmark| (b.id.clone(), b.title.clone(), b.url.clone())
                            children=move |b: Bookmark| view! { <BookmarkTile bookmark=b on_delete=on_delete /> }
                        />
                    </div>
                </Show>
            </div>
        </div>
    }
}

#[component]
pub fn RootPage() -> impl IntoView {
    let app = expect_context::<AppContext>().0;
    let signed_in = move || app.identity.with(|i| i.is_some());

    view! {
        <Show when=signed_in fallback=|| view! { <SignInPage /> }>
            <DashboardPage />
        </Show>
    }
}
