use leptos::prelude::*;

use crate::state::{AppState, Page};

/// Top bar with navigation, token quota and session controls.
#[component]
pub fn Navbar(state: AppState) -> impl IntoView {
    let authenticated = state.authenticated;
    let usage = state.token_usage;

    let nav = state.clone();
    let go = move |page: Page| {
        let nav = nav.clone();
        move |_| nav.navigate(page.clone())
    };
    let out = state.clone();

    view! {
        <nav class="navbar">
            <button class="brand" on:click=go(Page::Home)>"NotesBuddy"</button>
            <div class="nav-links">
                <Show
                    when=move || authenticated.get()
                    fallback={
                        let go = go.clone();
                        move || view! {
                            <button class="nav-link" on:click=go(Page::Login)>"Login"</button>
                            <button class="nav-link primary" on:click=go(Page::Signup)>"Sign up"</button>
                        }
                    }
                >
                    <button class="nav-link" on:click=go(Page::Dashboard)>"My Notes"</button>
                    {move || usage.get().map(|u| {
                        let label = match (u.remaining(), u.daily_limit) {
                            (Some(left), Some(limit)) => format!("{left} / {limit} tokens left"),
                            _ => format!("{} tokens used", u.tokens_used),
                        };
                        view! { <span class="token-usage">{label}</span> }
                    })}
                    <button class="nav-link" on:click={
                        let out = out.clone();
                        move |_| out.logout()
                    }>"Logout"</button>
                </Show>
            </div>
        </nav>
    }
}
