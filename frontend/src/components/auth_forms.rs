use leptos::ev::SubmitEvent;
use leptos::prelude::*;

use notesbuddy::models::RegisterRequest;

use crate::state::{AppState, Page};

fn form_error_view(error: ReadSignal<Option<String>>) -> impl IntoView {
    move || error.get().map(|msg| view! { <div class="form-error">{msg}</div> })
}

#[component]
pub fn LoginForm(state: AppState) -> impl IntoView {
    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (error, set_error) = signal(None::<String>);

    let to_signup = state.clone();
    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        state.login(email.get_untracked(), password.get_untracked(), set_error);
    };

    view! {
        <section class="auth-form">
            <h2>"Login"</h2>
            {form_error_view(error)}
            <form on:submit=submit>
                <input
                    type="email"
                    placeholder="Email"
                    prop:value=email
                    on:input=move |ev| set_email.set(event_target_value(&ev))
                />
                <input
                    type="password"
                    placeholder="Password"
                    prop:value=password
                    on:input=move |ev| set_password.set(event_target_value(&ev))
                />
                <button type="submit">"Login"</button>
            </form>
            <p>
                "No account? "
                <button class="link" on:click=move |_| to_signup.navigate(Page::Signup)>"Sign up"</button>
            </p>
        </section>
    }
}

#[component]
pub fn SignupForm(state: AppState) -> impl IntoView {
    let (email, set_email) = signal(String::new());
    let (username, set_username) = signal(String::new());
    let (full_name, set_full_name) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (error, set_error) = signal(None::<String>);

    let to_login = state.clone();
    let submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        let full_name = full_name.get_untracked();
        let request = RegisterRequest {
            email: email.get_untracked(),
            username: username.get_untracked(),
            password: password.get_untracked(),
            full_name: (!full_name.trim().is_empty()).then_some(full_name),
        };
        state.register(request, set_error);
    };

    view! {
        <section class="auth-form">
            <h2>"Create an account"</h2>
            {form_error_view(error)}
            <form on:submit=submit>
                <input
                    type="email"
                    placeholder="Email"
                    prop:value=email
                    on:input=move |ev| set_email.set(event_target_value(&ev))
                />
                <input
                    type="text"
                    placeholder="Username"
                    prop:value=username
                    on:input=move |ev| set_username.set(event_target_value(&ev))
                />
                <input
                    type="text"
                    placeholder="Full name (optional)"
                    prop:value=full_name
                    on:input=move |ev| set_full_name.set(event_target_value(&ev))
                />
                <input
                    type="password"
                    placeholder="Password"
                    prop:value=password
                    on:input=move |ev| set_password.set(event_target_value(&ev))
                />
                <button type="submit">"Sign up"</button>
            </form>
            <p>
                "Already registered? "
                <button class="link" on:click=move |_| to_login.navigate(Page::Login)>"Login"</button>
            </p>
        </section>
    }
}
