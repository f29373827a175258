use leptos::prelude::*;

use crate::state::{AppState, Page};

const PREVIEW_CHARS: usize = 150;

/// Lists the user's saved notes.
#[component]
pub fn Dashboard(state: AppState) -> impl IntoView {
    if state.gate.require_authenticated().is_ok() {
        state.load_notes();
    }
    let notes = state.notes;
    let loading = state.notes_loading;
    let home = state.clone();

    view! {
        <section class="dashboard">
            <h2>"My Notes"</h2>
            {move || {
                if loading.get() {
                    view! { <div class="loading">"Loading notes..."</div> }.into_any()
                } else if notes.with(Vec::is_empty) {
                    let home = home.clone();
                    view! {
                        <div class="empty-state">
                            "No notes yet. "
                            <button on:click=move |_| home.navigate(Page::Home)>
                                "Generate your first notes"
                            </button>
                        </div>
                    }
                    .into_any()
                } else {
                    let state = state.clone();
                    view! {
                        <div class="note-grid">
                            <For each=move || notes.get() key=|n| n.id let:note>
                                {
                                    let state = state.clone();
                                    let id = note.id;
                                    view! {
                                        <article
                                            class="note-card"
                                            on:click=move |_| state.navigate(Page::Note(id))
                                        >
                                            <h3>{note.title.clone()}</h3>
                                            <p class="note-meta">
                                                {format!("{} · {} · {}", note.language, note.style, note.created_at.format("%b %e, %Y"))}
                                            </p>
                                            <p class="note-preview">{note.preview(PREVIEW_CHARS)}</p>
                                        </article>
                                    }
                                }
                            </For>
                        </div>
                    }
                    .into_any()
                }
            }}
        </section>
    }
}
