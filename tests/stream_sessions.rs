use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use notesbuddy::errors::GENERIC_FAILURE;
use notesbuddy::models::{
    ChatRequest, GenerateRequest, LoginRequest, NoteId, NoteStyle, RegisterRequest, TokenResponse,
    User,
};
use notesbuddy::stream::{
    ingest, run_session, CancelToken, SentinelMode, StreamObserver, StreamRequest, StreamState,
    StreamTransport,
};
use notesbuddy::{AppError, AuthBackend, AuthGate, Credential, MemoryStore};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("notesbuddy=debug"))
            .with_test_writer()
            .try_init();
    });
}

// ── Fakes ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    texts: Vec<String>,
    ids: Vec<NoteId>,
}

impl StreamObserver for Recorder {
    fn on_text(&mut self, text: &str) {
        self.texts.push(text.to_string());
    }

    fn on_note_id(&mut self, id: NoteId) {
        self.ids.push(id);
    }
}

type Script = Result<Vec<Result<Vec<u8>, AppError>>, AppError>;

/// Answers each `open` with the next scripted response.
struct ScriptedTransport {
    script: Mutex<VecDeque<Script>>,
    tokens_seen: Mutex<Vec<String>>,
    chunks_read: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    fn new(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            tokens_seen: Mutex::new(Vec::new()),
            chunks_read: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn opens(&self) -> usize {
        self.tokens_seen.lock().unwrap().len()
    }
}

impl StreamTransport for ScriptedTransport {
    type Chunk = Vec<u8>;
    type Body = BoxStream<'static, Result<Vec<u8>, AppError>>;

    async fn open(
        &self,
        _request: &StreamRequest,
        credential: &Credential,
    ) -> Result<Self::Body, AppError> {
        self.tokens_seen.lock().unwrap().push(credential.access_token.clone());
        let next = self.script.lock().unwrap().pop_front().expect("unscripted open");
        let chunks = next?;
        let counter = Arc::clone(&self.chunks_read);
        Ok(stream::iter(chunks)
            .inspect(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }
}

struct FakeAuth {
    refresh_ok: bool,
    refreshes: Arc<AtomicUsize>,
}

impl AuthBackend for FakeAuth {
    async fn login(&self, _request: &LoginRequest) -> Result<TokenResponse, AppError> {
        unreachable!("not used")
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<User, AppError> {
        unreachable!("not used")
    }

    async fn refresh(&self, _credential: &Credential) -> Result<TokenResponse, AppError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.refresh_ok {
            Ok(TokenResponse {
                access_token: "fresh".into(),
                token_type: "bearer".into(),
                refresh_token: None,
            })
        } else {
            Err(AppError::Unauthorized)
        }
    }

    async fn logout(&self, _credential: &Credential) -> Result<(), AppError> {
        Ok(())
    }
}

struct Harness {
    gate: AuthGate<FakeAuth, MemoryStore>,
    refreshes: Arc<AtomicUsize>,
    redirects: Arc<AtomicUsize>,
}

fn signed_in(refresh_ok: bool) -> Harness {
    init_tracing();
    let refreshes = Arc::new(AtomicUsize::new(0));
    let redirects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&redirects);
    let gate = AuthGate::new(
        FakeAuth { refresh_ok, refreshes: Arc::clone(&refreshes) },
        MemoryStore::with(Credential { access_token: "stale".into(), refresh_token: Some("r".into()) }),
    )
    .on_expired(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(gate.restore());
    Harness { gate, refreshes, redirects }
}

fn generate() -> StreamRequest {
    StreamRequest::Generate(GenerateRequest {
        url: "https://www.youtube.com/watch?v=abc".into(),
        language: "en".into(),
        style: NoteStyle::Detailed,
    })
}

fn ok_chunks(parts: &[&str]) -> Script {
    Ok(parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect())
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn plain_chunks_concatenate_without_identifier() {
    let h = signed_in(true);
    let transport = ScriptedTransport::new(vec![ok_chunks(&["Hello ", "wor", "ld"])]);
    let mut rec = Recorder::default();

    let outcome = run_session(
        &h.gate,
        &transport,
        &generate(),
        &mut rec,
        &CancelToken::new(),
        SentinelMode::Buffered,
    )
    .await;

    assert_eq!(outcome.state, StreamState::Completed);
    assert_eq!(outcome.text, "Hello world");
    assert_eq!(outcome.note_id, None);
    assert_eq!(rec.texts.last().map(String::as_str), Some("Hello world"));
    assert!(rec.ids.is_empty());
}

#[tokio::test]
async fn marker_is_stripped_and_identifier_surfaced_once() {
    let h = signed_in(true);
    let transport = ScriptedTransport::new(vec![ok_chunks(&["<!-- NOTE_ID: 42 -->Hello"])]);
    let mut rec = Recorder::default();

    let outcome = run_session(
        &h.gate,
        &transport,
        &generate(),
        &mut rec,
        &CancelToken::new(),
        SentinelMode::PerChunk,
    )
    .await;

    assert_eq!(outcome.text, "Hello");
    assert_eq!(outcome.note_id, Some(42));
    assert_eq!(rec.ids, vec![42]);
    assert!(rec.texts.iter().all(|t| !t.contains("NOTE_ID")));
}

#[tokio::test]
async fn unauthorized_open_refreshes_and_retries_once() {
    let h = signed_in(true);
    let transport = ScriptedTransport::new(vec![
        Err(AppError::Unauthorized),
        ok_chunks(&["retried"]),
    ]);
    let mut rec = Recorder::default();

    let outcome = run_session(
        &h.gate,
        &transport,
        &generate(),
        &mut rec,
        &CancelToken::new(),
        SentinelMode::Buffered,
    )
    .await;

    assert_eq!(outcome.state, StreamState::Completed);
    assert_eq!(outcome.text, "retried");
    assert_eq!(*transport.tokens_seen.lock().unwrap(), vec!["stale", "fresh"]);
    assert_eq!(h.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(h.redirects.load(Ordering::SeqCst), 0);
    assert!(h.gate.is_authenticated());
}

#[tokio::test]
async fn failed_refresh_redirects_and_shows_nothing() {
    let h = signed_in(false);
    let transport = ScriptedTransport::new(vec![Err(AppError::Unauthorized)]);
    let mut rec = Recorder::default();

    let outcome = run_session(
        &h.gate,
        &transport,
        &generate(),
        &mut rec,
        &CancelToken::new(),
        SentinelMode::Buffered,
    )
    .await;

    assert_eq!(outcome.state, StreamState::Errored);
    assert_eq!(outcome.error, Some(AppError::SessionExpired));
    assert!(outcome.text.is_empty());
    assert!(rec.texts.is_empty());
    assert_eq!(transport.opens(), 1);
    assert_eq!(transport.chunks_read.load(Ordering::SeqCst), 0);
    assert_eq!(h.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(h.redirects.load(Ordering::SeqCst), 1);
    assert!(!h.gate.is_authenticated());
}

#[tokio::test]
async fn still_unauthorized_after_refresh_gives_up() {
    let h = signed_in(true);
    let transport =
        ScriptedTransport::new(vec![Err(AppError::Unauthorized), Err(AppError::Unauthorized)]);
    let mut rec = Recorder::default();

    let outcome = run_session(
        &h.gate,
        &transport,
        &generate(),
        &mut rec,
        &CancelToken::new(),
        SentinelMode::Buffered,
    )
    .await;

    assert_eq!(outcome.error, Some(AppError::SessionExpired));
    assert_eq!(transport.opens(), 2);
    assert_eq!(h.redirects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn quota_exceeded_chat_is_terminal_and_verbatim() {
    let h = signed_in(true);
    let transport = ScriptedTransport::new(vec![Err(AppError::from_status(
        429,
        r#"{"detail":"Daily token limit exceeded. Try again tomorrow."}"#,
    ))]);
    let request = StreamRequest::Chat { note_id: 5, request: ChatRequest { message: "hi".into() } };
    let mut rec = Recorder::default();

    let outcome =
        run_session(&h.gate, &transport, &request, &mut rec, &CancelToken::new(), SentinelMode::Buffered)
            .await;

    assert_eq!(outcome.state, StreamState::Errored);
    assert_eq!(
        outcome.user_message().as_deref(),
        Some("Daily token limit exceeded. Try again tomorrow.")
    );
    assert_eq!(transport.opens(), 1);
    assert_eq!(h.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn read_error_before_any_chunk_is_generic_failure() {
    init_tracing();
    let body = stream::iter(vec![Err::<Vec<u8>, _>(AppError::transport("connection reset"))]);
    let mut rec = Recorder::default();

    let outcome = ingest(Ok(body), &mut rec, &CancelToken::new(), SentinelMode::Buffered).await;

    assert_eq!(outcome.state, StreamState::Errored);
    assert!(outcome.text.is_empty());
    assert_eq!(outcome.user_message().as_deref(), Some(GENERIC_FAILURE));
    assert!(rec.texts.is_empty());
}

/// Cancels the session as soon as the first text arrives.
struct CancelOnFirst {
    cancel: CancelToken,
    texts: Vec<String>,
}

impl StreamObserver for CancelOnFirst {
    fn on_text(&mut self, text: &str) {
        self.texts.push(text.to_string());
        self.cancel.cancel();
    }

    fn on_note_id(&mut self, _id: NoteId) {}
}

#[tokio::test]
async fn cancellation_stops_further_updates() {
    init_tracing();
    let cancel = CancelToken::new();
    let mut observer = CancelOnFirst { cancel: cancel.clone(), texts: Vec::new() };
    let body = stream::iter(["one ", "two ", "three"].map(|s| Ok::<_, AppError>(s.as_bytes().to_vec())));

    let outcome = ingest(Ok(body), &mut observer, &cancel, SentinelMode::Buffered).await;

    assert_eq!(outcome.state, StreamState::Cancelled);
    assert_eq!(observer.texts, vec!["one "]);
    assert_eq!(outcome.text, "one ");
}

#[tokio::test]
async fn arbitrary_byte_splits_decode_and_capture() {
    init_tracing();
    let source = "Résumé 📚 <!-- NOTE_ID: 7 -->Ωmega notes";
    let expected = "Résumé 📚 Ωmega notes";
    let bytes = source.as_bytes();

    for i in 0..=bytes.len() {
        for j in i..=bytes.len() {
            let parts = vec![bytes[..i].to_vec(), bytes[i..j].to_vec(), bytes[j..].to_vec()];
            let body = stream::iter(parts.into_iter().map(Ok::<_, AppError>));
            let mut rec = Recorder::default();
            let outcome =
                ingest(Ok(body), &mut rec, &CancelToken::new(), SentinelMode::Buffered).await;
            assert_eq!(outcome.text, expected, "splits {i},{j}");
            assert_eq!(rec.ids, vec![7], "splits {i},{j}");
        }
    }
}
