use leptos::prelude::*;

use notesbuddy::models::GenerateRequest;
use notesbuddy::stream::{CancelToken, StreamState};

use crate::state::AppState;

/// Live view of a note being generated. Leaving the view cancels the stream.
#[component]
pub fn Generating(state: AppState, request: GenerateRequest) -> impl IntoView {
    let cancel = CancelToken::new();
    let on_leave = cancel.clone();
    on_cleanup(move || on_leave.cancel());

    let text = state.generation_text;
    let stream_state = state.generation_state;
    let source = request.url.clone();
    state.run_generation(request, cancel);

    view! {
        <section class="generating">
            <header class="generating-header">
                <h2>
                    {move || match stream_state.get() {
                        StreamState::Idle | StreamState::Streaming => "Generating notes...",
                        StreamState::Completed => "Notes ready",
                        StreamState::Errored => "Generation failed",
                        StreamState::Cancelled => "Generation cancelled",
                    }}
                </h2>
                <p class="source-url">{source}</p>
            </header>
            <pre
                class="notes-body"
                class:streaming-cursor=move || stream_state.get() == StreamState::Streaming
            >
                {move || text.get()}
            </pre>
        </section>
    }
}
