mod api;
mod clipboard;
mod components;
mod download;
mod state;
mod storage;
mod stream;

use leptos::mount::mount_to_body;
use leptos::prelude::*;

use notesbuddy::ClientConfig;

use components::auth_forms::{LoginForm, SignupForm};
use components::dashboard::Dashboard;
use components::generating::Generating;
use components::home::Home;
use components::navbar::Navbar;
use components::note_view::NoteView;
use state::{AppState, Page};

/// Settings are baked in at build time; the browser has no environment.
fn load_config() -> ClientConfig {
    let lookup = |key: &str| {
        match key {
            "NOTESBUDDY_API_BASE" => option_env!("NOTESBUDDY_API_BASE"),
            "NOTESBUDDY_DEFAULT_LANGUAGE" => option_env!("NOTESBUDDY_DEFAULT_LANGUAGE"),
            "NOTESBUDDY_DEFAULT_STYLE" => option_env!("NOTESBUDDY_DEFAULT_STYLE"),
            "NOTESBUDDY_CHAT_WIDTH_MIN" => option_env!("NOTESBUDDY_CHAT_WIDTH_MIN"),
            "NOTESBUDDY_CHAT_WIDTH_MAX" => option_env!("NOTESBUDDY_CHAT_WIDTH_MAX"),
            "NOTESBUDDY_CHAT_WIDTH" => option_env!("NOTESBUDDY_CHAT_WIDTH"),
            "NOTESBUDDY_SENTINEL_MODE" => option_env!("NOTESBUDDY_SENTINEL_MODE"),
            _ => None,
        }
        .map(str::to_string)
    };
    ClientConfig::from_lookup(lookup).unwrap_or_else(|e| {
        log::error!("Invalid build configuration, using defaults: {e}");
        ClientConfig::default()
    })
}

/// Root application component.
#[component]
fn App() -> impl IntoView {
    let state = AppState::new(load_config());
    state.refresh_usage();

    let page = state.page;
    let error = state.error;
    let notice = state.notice;
    let set_error = state.set_error;
    let set_notice = state.set_notice;
    let routed = state.clone();

    view! {
        <div class="app-container">
            <Navbar state=state />
            {move || notice.get().map(|msg| view! {
                <div class="notice-banner" on:click=move |_| set_notice.set(None)>{msg}</div>
            })}
            {move || error.get().map(|err| view! {
                <div class="error-banner" on:click=move |_| set_error.set(None)>{err}</div>
            })}
            <main class="page">
                {move || {
                    let state = routed.clone();
                    match page.get() {
                        Page::Home => view! { <Home state=state /> }.into_any(),
                        Page::Generating(request) => {
                            view! { <Generating state=state request=request /> }.into_any()
                        }
                        Page::Dashboard => view! { <Dashboard state=state /> }.into_any(),
                        Page::Note(id) => view! { <NoteView state=state id=id /> }.into_any(),
                        Page::Login => view! { <LoginForm state=state /> }.into_any(),
                        Page::Signup => view! { <SignupForm state=state /> }.into_any(),
                    }
                }}
            </main>
        </div>
    }
}

fn main() {
    console_log::init_with_level(log::Level::Debug).expect("Failed to init logger");
    mount_to_body(App);
}
