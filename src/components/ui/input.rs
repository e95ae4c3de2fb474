use leptos::html;
use leptos::prelude::*;
use tw_merge::tw_merge;
use wasm_bindgen::JsCast;

#[component]
pub fn Input(
    // Styling
    #[prop(into, optional)] class: String,

    // Common HTML attributes
    #[prop(into, default = "text")] r#type: &'static str,
    #[prop(into, optional)] placeholder: String,
    #[prop(into, optional)] name: String,
    #[prop(into, optional)] id: String,
    #[prop(optional)] autofocus: bool,

    // Two-way binding
    //
    // NOTE: `bind:value=...` changed shape across Leptos versions; this manual
    // wiring is stable.
    #[prop(into)] bind_value: RwSignal<String>,

    /// Fired when Enter is pressed inside the field.
    #[prop(optional, into)] on_enter: Option<Callback<()>>,

    // Ref for direct DOM access
    #[prop(optional)] node_ref: NodeRef<html::Input>,
) -> impl IntoView {
    let merged_class = tw_merge!(
        "w-full min-w-0 bg-white/5 text-white placeholder-gray-600 outline-none transition-all",
        "focus-visible:ring-2 focus-visible:ring-blue-500/50",
        class
    );

    let on_input = move |ev: web_sys::Event| {
        if let Some(target) = ev.target() {
            if let Some(input) = target.dyn_ref::<web_sys::HtmlInputElement>() {
                bind_value.set(input.value());
            }
        }
    };

    let on_keydown = move |ev: web_sys::KeyboardEvent| {
        if ev.key() == "Enter" {
            if let Some(cb) = on_enter {
                ev.prevent_default();
                cb.run(());
            }
        }
    };

    view! {
        <input
            data-name="Input"
            type=r#type
            class=merged_class
            placeholder=placeholder
            name=name
            id=id
            autofocus=autofocus
            prop:value=move || bind_value.get()
            on:input=on_input
            on:keydown=on_keydown
            node_ref=node_ref
        />
    }
    .into_any()
}
