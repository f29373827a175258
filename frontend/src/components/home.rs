use leptos::prelude::*;

use notesbuddy::models::NoteStyle;

use crate::state::AppState;

const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("hi", "Hindi"),
    ("ja", "Japanese"),
];

/// Landing page with the note generation form.
#[component]
pub fn Home(state: AppState) -> impl IntoView {
    let (url, set_url) = signal(String::new());
    let (language, set_language) = signal(state.config.default_language.clone());
    let (style, set_style) = signal(state.config.default_style.to_string());

    let submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let style = NoteStyle::from(style.get_untracked());
        state.submit_generation(&url.get_untracked(), language.get_untracked(), style);
    };

    view! {
        <section class="home">
            <h1>"Turn any YouTube video into study notes"</h1>
            <form class="generate-form" on:submit=submit>
                <input
                    type="url"
                    placeholder="https://www.youtube.com/watch?v=..."
                    prop:value=url
                    on:input=move |ev| set_url.set(event_target_value(&ev))
                />
                <select
                    prop:value=language
                    on:change=move |ev| set_language.set(event_target_value(&ev))
                >
                    {LANGUAGES
                        .iter()
                        .map(|(code, name)| view! { <option value=*code>{*name}</option> })
                        .collect_view()}
                </select>
                <select
                    prop:value=style
                    on:change=move |ev| set_style.set(event_target_value(&ev))
                >
                    {NoteStyle::choices()
                        .iter()
                        .map(|s| {
                            let value = s.to_string();
                            let label = value.clone();
                            view! { <option value=value>{label}</option> }
                        })
                        .collect_view()}
                </select>
                <button type="submit" disabled=move || url.get().trim().is_empty()>
                    "Generate Notes"
                </button>
            </form>
        </section>
    }
}
