use leptos::ev;
use leptos::prelude::*;

use notesbuddy::chat::ChatThread;
use notesbuddy::models::{ChatMessage, MessageRole};
use notesbuddy::stream::CancelToken;

use crate::state::AppState;

/// Chat about the open note, with the assistant reply streamed in place.
#[component]
pub fn ChatPanel(state: AppState, cancel: CancelToken) -> impl IntoView {
    let chat = state.chat;

    view! {
        <div class="chat">
            <div class="chat-header">"Ask about these notes"</div>
            <div class="messages-container">
                {move || {
                    chat.with(|thread| match thread {
                        Some(thread) if !thread.is_empty() => thread
                            .messages()
                            .iter()
                            .cloned()
                            .map(|msg| view! { <MessageBubble msg=msg /> })
                            .collect_view()
                            .into_any(),
                        _ => view! {
                            <div class="empty-state">"Ask a question to start chatting"</div>
                        }
                        .into_any(),
                    })
                }}
            </div>
            <ChatInput state=state cancel=cancel />
        </div>
    }
}

/// A single chat message bubble.
#[component]
fn MessageBubble(msg: ChatMessage) -> impl IntoView {
    let css_class = match msg.role {
        MessageRole::User => "message user",
        MessageRole::Assistant => "message assistant",
    };

    view! {
        <div class=css_class>
            <div class="role-label">{msg.role.to_string()}</div>
            <div class="message-content">{msg.content}</div>
        </div>
    }
}

/// Question box. Enter sends, Shift+Enter inserts a newline.
#[component]
fn ChatInput(state: AppState, cancel: CancelToken) -> impl IntoView {
    let (draft, set_draft) = signal(String::new());
    let chat = state.chat;
    let replying = move || chat.with(|c| c.as_ref().is_some_and(ChatThread::is_replying));

    let ask = move || {
        let question = draft.get_untracked();
        if question.trim().is_empty() || replying() {
            return;
        }
        set_draft.set(String::new());
        state.send_chat(question, cancel.clone());
    };
    let ask_on_enter = ask.clone();

    view! {
        <form
            class="chat-form"
            on:submit=move |ev: ev::SubmitEvent| {
                ev.prevent_default();
                ask();
            }
        >
            <textarea
                rows="2"
                placeholder="Ask something about these notes"
                prop:value=draft
                disabled=replying
                on:input=move |ev| set_draft.set(event_target_value(&ev))
                on:keydown=move |ev: ev::KeyboardEvent| {
                    if ev.key() == "Enter" && !ev.shift_key() {
                        ev.prevent_default();
                        ask_on_enter();
                    }
                }
            />
            <button type="submit" disabled=move || replying() || draft.with(|d| d.trim().is_empty())>
                {move || if replying() { "Thinking…" } else { "Ask" }}
            </button>
        </form>
    }
}
