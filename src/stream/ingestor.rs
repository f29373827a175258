use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{pin_mut, Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::NoteId;
use crate::stream::decoder::Utf8Decoder;
use crate::stream::sentinel::{SentinelExtractor, SentinelMode};

/// Lifecycle of one stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Errored | StreamState::Cancelled)
    }
}

/// Receives progress from a running session.
pub trait StreamObserver {
    /// Called with the full accumulated text whenever it grows.
    fn on_text(&mut self, text: &str);

    /// Called once, when the note id marker is captured.
    fn on_note_id(&mut self, id: NoteId);
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What one chunk changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkUpdate {
    pub text_grew: bool,
    pub note_id: Option<NoteId>,
}

/// Accumulates a stream into display text plus the side-channel note id.
///
/// The text only ever grows. Once a terminal state is reached the ingestor
/// is spent; a new session needs a new ingestor.
#[derive(Debug)]
pub struct StreamIngestor {
    id: Uuid,
    state: StreamState,
    text: String,
    note_id: Option<NoteId>,
    error: Option<AppError>,
    decoder: Utf8Decoder,
    extractor: SentinelExtractor,
    bytes_read: usize,
}

impl StreamIngestor {
    pub fn new(mode: SentinelMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: StreamState::Idle,
            text: String::new(),
            note_id: None,
            error: None,
            decoder: Utf8Decoder::new(),
            extractor: SentinelExtractor::new(mode),
            bytes_read: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn note_id(&self) -> Option<NoteId> {
        self.note_id
    }

    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    pub fn begin(&mut self) -> Result<(), AppError> {
        if self.state != StreamState::Idle {
            return Err(AppError::invalid_state(format!(
                "cannot start streaming from {:?}",
                self.state
            )));
        }
        self.state = StreamState::Streaming;
        debug!(session = %self.id, "stream session streaming");
        Ok(())
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<ChunkUpdate, AppError> {
        self.expect_streaming("push")?;
        self.bytes_read += bytes.len();
        let decoded = self.decoder.decode(bytes);
        let extracted = self.extractor.push(&decoded);
        Ok(self.absorb(&extracted.text, extracted.note_id))
    }

    /// Flushes the decoder and any held marker prefix, then completes.
    pub fn finish(&mut self) -> Result<ChunkUpdate, AppError> {
        self.expect_streaming("finish")?;
        let update = self.release_held();
        self.state = StreamState::Completed;
        info!(
            session = %self.id,
            bytes = self.bytes_read,
            chars = self.text.chars().count(),
            note_id = ?self.note_id,
            "stream session completed"
        );
        Ok(update)
    }

    /// Ends the session with `err`. Text received before the failure,
    /// including anything held back, stays in the display text.
    pub fn fail(&mut self, err: AppError) -> ChunkUpdate {
        if self.state.is_terminal() {
            return ChunkUpdate::default();
        }
        let update = if self.state == StreamState::Streaming {
            self.release_held()
        } else {
            ChunkUpdate::default()
        };
        warn!(session = %self.id, error = %err, "stream session failed");
        self.state = StreamState::Errored;
        self.error = Some(err);
        update
    }

    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        info!(session = %self.id, bytes = self.bytes_read, "stream session cancelled");
        self.state = StreamState::Cancelled;
    }

    pub fn into_outcome(self) -> StreamOutcome {
        StreamOutcome {
            session_id: self.id,
            state: self.state,
            text: self.text,
            note_id: self.note_id,
            error: self.error,
        }
    }

    fn expect_streaming(&self, op: &str) -> Result<(), AppError> {
        if self.state == StreamState::Streaming {
            Ok(())
        } else {
            Err(AppError::invalid_state(format!("cannot {op} while {:?}", self.state)))
        }
    }

    /// Flushes the decoder and the extractor's held-back suffix.
    fn release_held(&mut self) -> ChunkUpdate {
        let tail = self.decoder.finish();
        let extracted = self.extractor.push(&tail);
        let mut update = self.absorb(&extracted.text, extracted.note_id);
        let held = self.extractor.finish();
        update.text_grew |= self.absorb(&held, None).text_grew;
        update
    }

    fn absorb(&mut self, text: &str, note_id: Option<NoteId>) -> ChunkUpdate {
        self.text.push_str(text);
        if let Some(id) = note_id {
            self.note_id.get_or_insert(id);
        }
        ChunkUpdate { text_grew: !text.is_empty(), note_id }
    }
}

/// Final result of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub session_id: Uuid,
    pub state: StreamState,
    pub text: String,
    pub note_id: Option<NoteId>,
    pub error: Option<AppError>,
}

impl StreamOutcome {
    pub fn user_message(&self) -> Option<String> {
        self.error.as_ref().map(AppError::user_message)
    }
}

fn publish<O: StreamObserver>(ingestor: &StreamIngestor, update: ChunkUpdate, observer: &mut O) {
    if update.text_grew {
        observer.on_text(ingestor.text());
    }
    if let Some(id) = update.note_id {
        observer.on_note_id(id);
    }
}

/// Runs one session over an opened chunk stream.
///
/// `opened` is the outcome of issuing the request. When it is an error no
/// chunk is read. `cancel` is checked after every suspension point; once it
/// is set the observer sees no further updates.
pub async fn ingest<S, B, O>(
    opened: Result<S, AppError>,
    observer: &mut O,
    cancel: &CancelToken,
    mode: SentinelMode,
) -> StreamOutcome
where
    S: Stream<Item = Result<B, AppError>>,
    B: AsRef<[u8]>,
    O: StreamObserver,
{
    let mut ingestor = StreamIngestor::new(mode);

    let stream = match opened {
        Ok(stream) => stream,
        Err(err) => {
            ingestor.fail(err);
            return ingestor.into_outcome();
        }
    };
    if cancel.is_cancelled() {
        ingestor.cancel();
        return ingestor.into_outcome();
    }
    if let Err(err) = ingestor.begin() {
        ingestor.fail(err);
        return ingestor.into_outcome();
    }

    pin_mut!(stream);
    while let Some(item) = stream.next().await {
        if cancel.is_cancelled() {
            ingestor.cancel();
            return ingestor.into_outcome();
        }
        match item.and_then(|chunk| ingestor.push_bytes(chunk.as_ref())) {
            Ok(update) => publish(&ingestor, update, observer),
            Err(err) => {
                let update = ingestor.fail(err);
                publish(&ingestor, update, observer);
                return ingestor.into_outcome();
            }
        }
    }

    if cancel.is_cancelled() {
        ingestor.cancel();
        return ingestor.into_outcome();
    }
    match ingestor.finish() {
        Ok(update) => publish(&ingestor, update, observer),
        Err(err) => {
            ingestor.fail(err);
        }
    }
    ingestor.into_outcome()
}
