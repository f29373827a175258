use leptos::ev;
use leptos::prelude::*;

use notesbuddy::layout::SplitPane;
use notesbuddy::models::NoteId;
use notesbuddy::stream::CancelToken;

use crate::components::chat::ChatPanel;
use crate::state::{AppState, Page};

fn viewport_right() -> f64 {
    window().inner_width().ok().and_then(|w| w.as_f64()).unwrap_or_default()
}

/// A single note with export actions and a resizable chat panel.
#[component]
pub fn NoteView(state: AppState, id: NoteId) -> impl IntoView {
    state.open_note(id);

    let cancel = CancelToken::new();
    let on_leave = cancel.clone();
    on_cleanup(move || on_leave.cancel());

    let config = state.config.clone();
    let (pane, set_pane) = signal(SplitPane::new(
        config.chat_width_initial,
        config.chat_width_min,
        config.chat_width_max,
    ));

    let on_move = window_event_listener(ev::mousemove, move |e| {
        if pane.with_untracked(SplitPane::is_resizing) {
            set_pane.update(|p| {
                p.resize_to(f64::from(e.client_x()), viewport_right());
            });
        }
    });
    let on_up = window_event_listener(ev::mouseup, move |_| {
        if pane.with_untracked(SplitPane::is_resizing) {
            set_pane.update(SplitPane::stop_resize);
        }
    });
    on_cleanup(move || {
        on_move.remove();
        on_up.remove();
    });

    let note = state.current_note;
    let actions = state.clone();

    view! {
        <section class="note-view" class:resizing=move || pane.with(SplitPane::is_resizing)>
            <div class="note-main">
                {move || match note.get() {
                    None => view! { <div class="loading">"Loading note..."</div> }.into_any(),
                    Some(current) => {
                        let back = actions.clone();
                        let copy = actions.clone();
                        let md = actions.clone();
                        let pdf = actions.clone();
                        let for_copy = current.clone();
                        let for_md = current.clone();
                        let for_pdf = current.clone();
                        view! {
                            <header class="note-header">
                                <button on:click=move |_| back.navigate(Page::Dashboard)>"Back"</button>
                                <h2>{current.title.clone()}</h2>
                                <div class="export-actions">
                                    <button on:click=move |_| copy.copy_notes(&for_copy)>"Copy"</button>
                                    <button on:click=move |_| md.export_markdown(&for_md)>"Markdown"</button>
                                    <button on:click=move |_| pdf.export_pdf(for_pdf.clone())>"PDF"</button>
                                </div>
                            </header>
                            <pre class="notes-body">{current.notes.clone()}</pre>
                        }
                        .into_any()
                    }
                }}
            </div>
            <div
                class="pane-divider"
                on:mousedown=move |e| {
                    e.prevent_default();
                    set_pane.update(SplitPane::start_resize);
                }
            />
            <aside class="chat-panel" style:width=move || format!("{}px", pane.with(SplitPane::width))>
                <ChatPanel state=state.clone() cancel=cancel.clone() />
            </aside>
        </section>
    }
}
