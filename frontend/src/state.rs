use std::future::Future;
use std::sync::Arc;

use gloo_timers::callback::Timeout;
use leptos::prelude::*;
use leptos::task::spawn_local;

use notesbuddy::chat::ChatThread;
use notesbuddy::errors::GENERIC_FAILURE;
use notesbuddy::export::{markdown_export, pdf_export};
use notesbuddy::models::{
    ChatRequest, GenerateRequest, Note, NoteId, NoteStyle, RegisterRequest, TokenUsage,
};
use notesbuddy::stream::{
    CancelToken, StreamObserver, StreamRequest, StreamState, run_session,
};
use notesbuddy::validation::validate_video_url;
use notesbuddy::{AppError, AuthGate, ClientConfig, Credential};

use crate::api::HttpBackend;
use crate::clipboard::copy_text;
use crate::download::download;
use crate::storage::LocalStorageStore;

pub type Gate = AuthGate<HttpBackend, LocalStorageStore>;

/// How long a failed generation stays on screen before returning home.
const ERROR_RETURN_MS: u32 = 3_000;

/// In-app navigation target.
#[derive(Clone, Debug, PartialEq)]
pub enum Page {
    Home,
    Generating(GenerateRequest),
    Dashboard,
    Note(NoteId),
    Login,
    Signup,
}

/// Application state. Passed explicitly to every component that needs it;
/// the auth gate is the only writer of the session.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ClientConfig>,
    pub gate: Gate,
    backend: HttpBackend,

    // --- Read signals (for components to subscribe to) ---
    pub page: ReadSignal<Page>,
    pub authenticated: ReadSignal<bool>,
    pub notes: ReadSignal<Vec<Note>>,
    pub notes_loading: ReadSignal<bool>,
    pub current_note: ReadSignal<Option<Note>>,
    pub generation_text: ReadSignal<String>,
    pub generation_state: ReadSignal<StreamState>,
    pub chat: ReadSignal<Option<ChatThread>>,
    pub token_usage: ReadSignal<Option<TokenUsage>>,
    pub error: ReadSignal<Option<String>>,
    pub notice: ReadSignal<Option<String>>,

    // --- Write signals (for mutating state) ---
    set_page: WriteSignal<Page>,
    set_notes: WriteSignal<Vec<Note>>,
    set_notes_loading: WriteSignal<bool>,
    set_current_note: WriteSignal<Option<Note>>,
    set_generation_text: WriteSignal<String>,
    set_generation_state: WriteSignal<StreamState>,
    set_chat: WriteSignal<Option<ChatThread>>,
    set_token_usage: WriteSignal<Option<TokenUsage>>,
    pub set_error: WriteSignal<Option<String>>,
    pub set_notice: WriteSignal<Option<String>>,
}

struct GenerationObserver {
    text: WriteSignal<String>,
}

impl StreamObserver for GenerationObserver {
    fn on_text(&mut self, text: &str) {
        self.text.set(text.to_string());
    }

    fn on_note_id(&mut self, id: NoteId) {
        log::info!("Backend stored generated note {id}");
    }
}

struct ReplyObserver {
    chat: WriteSignal<Option<ChatThread>>,
}

impl StreamObserver for ReplyObserver {
    fn on_text(&mut self, text: &str) {
        self.chat.update(|chat| {
            if let Some(thread) = chat {
                thread.update_reply(text);
            }
        });
    }

    fn on_note_id(&mut self, id: NoteId) {
        log::warn!("Ignoring note id {id} in a chat reply");
    }
}

impl AppState {
    pub fn new(config: ClientConfig) -> Self {
        let (page, set_page) = signal(Page::Home);
        let (authenticated, set_authenticated) = signal(false);
        let (notes, set_notes) = signal(Vec::<Note>::new());
        let (notes_loading, set_notes_loading) = signal(false);
        let (current_note, set_current_note) = signal(None::<Note>);
        let (generation_text, set_generation_text) = signal(String::new());
        let (generation_state, set_generation_state) = signal(StreamState::Idle);
        let (chat, set_chat) = signal(None::<ChatThread>);
        let (token_usage, set_token_usage) = signal(None::<TokenUsage>);
        let (error, set_error) = signal(None::<String>);
        let (notice, set_notice) = signal(None::<String>);

        let backend = HttpBackend::new(&config.api_base);
        let gate = AuthGate::new(backend.clone(), LocalStorageStore)
            .on_change(move |auth| set_authenticated.set(auth))
            .on_expired(move || set_page.set(Page::Login));
        gate.restore();

        Self {
            config: Arc::new(config),
            gate,
            backend,
            page,
            authenticated,
            notes,
            notes_loading,
            current_note,
            generation_text,
            generation_state,
            chat,
            token_usage,
            error,
            notice,
            set_page,
            set_notes,
            set_notes_loading,
            set_current_note,
            set_generation_text,
            set_generation_state,
            set_chat,
            set_token_usage,
            set_error,
            set_notice,
        }
    }

    pub fn navigate(&self, page: Page) {
        self.set_error.set(None);
        self.set_page.set(page);
    }

    fn report(&self, context: &str, err: &AppError) {
        log::error!("{context}: {err}");
        self.set_error.set(Some(err.user_message()));
    }

    /// Runs a backend call behind the gate's refresh-and-retry.
    async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, AppError>
    where
        F: Fn(HttpBackend, Credential) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let backend = self.backend.clone();
        self.gate.authorized(|credential| call(backend.clone(), credential)).await
    }

    // ── Auth ─────────────────────────────────────────────────────────────────

    pub fn login(&self, email: String, password: String, form_error: WriteSignal<Option<String>>) {
        let state = self.clone();
        form_error.set(None);
        spawn_local(async move {
            match state.gate.login(&email, &password).await {
                Ok(()) => {
                    state.set_notice.set(Some("Successfully logged in!".to_string()));
                    state.navigate(Page::Home);
                    state.refresh_usage();
                }
                Err(e) => {
                    log::error!("Login failed: {e}");
                    form_error.set(Some(e.user_message()));
                }
            }
        });
    }

    pub fn register(&self, request: RegisterRequest, form_error: WriteSignal<Option<String>>) {
        let state = self.clone();
        form_error.set(None);
        spawn_local(async move {
            match state.gate.register(request).await {
                Ok(_) => {
                    state.set_notice.set(Some("Registration successful! Please login.".to_string()));
                    state.navigate(Page::Login);
                }
                Err(e) => {
                    log::error!("Registration failed: {e}");
                    form_error.set(Some(e.user_message()));
                }
            }
        });
    }

    pub fn logout(&self) {
        let state = self.clone();
        spawn_local(async move {
            state.gate.logout().await;
            state.set_notes.set(Vec::new());
            state.set_current_note.set(None);
            state.set_chat.set(None);
            state.set_token_usage.set(None);
            state.set_notice.set(Some("Logged out successfully".to_string()));
            state.navigate(Page::Login);
        });
    }

    pub fn refresh_usage(&self) {
        if !self.gate.is_authenticated() {
            return;
        }
        let state = self.clone();
        spawn_local(async move {
            match state
                .authorized(|backend, cred| async move { backend.token_usage(&cred).await })
                .await
            {
                Ok(usage) => state.set_token_usage.set(Some(usage)),
                Err(e) => log::warn!("Failed to fetch token usage: {e}"),
            }
        });
    }

    // ── Notes ────────────────────────────────────────────────────────────────

    pub fn load_notes(&self) {
        let state = self.clone();
        self.set_notes_loading.set(true);
        spawn_local(async move {
            match state
                .authorized(|backend, cred| async move { backend.list_notes(&cred).await })
                .await
            {
                Ok(notes) => state.set_notes.set(notes),
                Err(e) => state.report("Failed to load notes", &e),
            }
            state.set_notes_loading.set(false);
        });
    }

    /// Loads a note and its chat history into view.
    pub fn open_note(&self, id: NoteId) {
        self.set_current_note.set(None);
        self.set_chat.set(Some(ChatThread::new(id)));
        let state = self.clone();
        spawn_local(async move {
            match state
                .authorized(|backend, cred| async move { backend.get_note(id, &cred).await })
                .await
            {
                Ok(note) => state.set_current_note.set(Some(note)),
                Err(e) => {
                    state.report("Failed to load note", &e);
                    return;
                }
            }
            match state
                .authorized(|backend, cred| async move { backend.chat_history(id, &cred).await })
                .await
            {
                Ok(history) => state.set_chat.update(|chat| {
                    if let Some(thread) = chat.as_mut().filter(|t| t.note_id() == id) {
                        thread.load_history(history);
                    }
                }),
                Err(e) => log::warn!("Failed to load chat history for note {id}: {e}"),
            }
        });
    }

    pub fn export_markdown(&self, note: &Note) {
        if let Err(e) = download(&markdown_export(note)) {
            self.report("Markdown export failed", &e);
        }
    }

    pub fn copy_notes(&self, note: &Note) {
        let state = self.clone();
        let text = note.notes.clone();
        spawn_local(async move {
            match copy_text(&text).await {
                Ok(()) => state.set_notice.set(Some("Notes copied to clipboard".to_string())),
                Err(e) => state.report("Copy to clipboard failed", &e),
            }
        });
    }

    pub fn export_pdf(&self, note: Note) {
        let state = self.clone();
        spawn_local(async move {
            let body = note.notes.clone();
            let result = state
                .authorized(|backend, cred| {
                    let body = body.clone();
                    async move { backend.export_pdf(&body, &cred).await }
                })
                .await
                .and_then(|bytes| download(&pdf_export(&note.video_id, bytes)));
            match result {
                Ok(()) => state.set_notice.set(Some("Notes exported successfully".to_string())),
                Err(e) => state.report("PDF export failed", &e),
            }
        });
    }

    // ── Generation ───────────────────────────────────────────────────────────

    /// Validates the form and moves to the generating view.
    pub fn submit_generation(&self, url: &str, language: String, style: NoteStyle) {
        let url = match validate_video_url(url) {
            Ok(url) => url,
            Err(e) => {
                self.set_error.set(Some(e.user_message()));
                return;
            }
        };
        if self.gate.require_authenticated().is_err() {
            self.set_notice.set(Some("Please login to generate notes".to_string()));
            return;
        }
        self.navigate(Page::Generating(GenerateRequest { url, language, style }));
    }

    /// Streams a note into `generation_text`. Nothing is written once
    /// `cancel` has been set.
    pub fn run_generation(&self, request: GenerateRequest, cancel: CancelToken) {
        self.set_generation_text.set(String::new());
        self.set_generation_state.set(StreamState::Streaming);
        self.set_error.set(None);

        let state = self.clone();
        spawn_local(async move {
            let mut observer = GenerationObserver { text: state.set_generation_text };
            let request = StreamRequest::Generate(request);
            let outcome = run_session(
                &state.gate,
                &state.backend,
                &request,
                &mut observer,
                &cancel,
                state.config.sentinel_mode,
            )
            .await;
            if cancel.is_cancelled() {
                log::debug!("Generation view closed; discarding session {}", outcome.session_id);
                return;
            }

            state.set_generation_state.set(outcome.state);
            match (outcome.state, outcome.note_id) {
                (StreamState::Completed, Some(id)) => {
                    state.set_notice.set(Some("Notes generated successfully!".to_string()));
                    state.refresh_usage();
                    state.navigate(Page::Note(id));
                }
                (StreamState::Completed, None) => {
                    log::warn!("Generation finished without a note id");
                    state.refresh_usage();
                }
                _ => {
                    let message = outcome.user_message().unwrap_or_else(|| GENERIC_FAILURE.to_string());
                    log::error!("Generation failed: {message}");
                    state.set_error.set(Some(message));
                    let auth_failure = outcome.error.as_ref().is_some_and(AppError::is_auth);
                    if !auth_failure {
                        state.return_home_later();
                    }
                }
            }
        });
    }

    fn return_home_later(&self) {
        let page = self.page;
        let set_page = self.set_page;
        Timeout::new(ERROR_RETURN_MS, move || {
            if matches!(page.get_untracked(), Page::Generating(_)) {
                set_page.set(Page::Home);
            }
        })
        .forget();
    }

    // ── Chat ─────────────────────────────────────────────────────────────────

    /// Sends a chat message about the open note and streams the reply.
    pub fn send_chat(&self, text: String, cancel: CancelToken) {
        if self.gate.require_authenticated().is_err() {
            return;
        }
        let Some(note_id) = self.chat.with_untracked(|chat| chat.as_ref().map(ChatThread::note_id))
        else {
            return;
        };
        let prepared = self.set_chat.try_update(|chat| match chat {
            Some(thread) => thread.push_user(&text).map(|message| {
                thread.begin_reply();
                message
            }),
            None => Err(AppError::invalid_state("no note is open")),
        });
        let message = match prepared {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                self.set_error.set(Some(e.user_message()));
                return;
            }
            None => return,
        };

        let state = self.clone();
        spawn_local(async move {
            let mut observer = ReplyObserver { chat: state.set_chat };
            let request = StreamRequest::Chat { note_id, request: ChatRequest { message } };
            let outcome = run_session(
                &state.gate,
                &state.backend,
                &request,
                &mut observer,
                &cancel,
                state.config.sentinel_mode,
            )
            .await;
            if cancel.is_cancelled() {
                return;
            }

            state.set_chat.update(|chat| {
                if let Some(thread) = chat.as_mut().filter(|t| t.note_id() == note_id) {
                    match outcome.state {
                        StreamState::Completed => thread.finish_reply(),
                        _ => thread.fail_reply(&outcome.user_message().unwrap_or_default()),
                    }
                }
            });
            state.refresh_usage();
        });
    }
}
