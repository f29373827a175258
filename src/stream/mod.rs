//! Ingestion of the chunked text responses produced by note generation and
//! note chat.

pub mod decoder;
pub mod ingestor;
pub mod sentinel;

use futures_util::Stream;

use crate::api::Endpoint;
use crate::auth::{AuthBackend, AuthGate, Credential, CredentialStore};
use crate::errors::AppError;
use crate::models::{ChatRequest, GenerateRequest, NoteId};

pub use decoder::Utf8Decoder;
pub use ingestor::{
    ingest, CancelToken, ChunkUpdate, StreamIngestor, StreamObserver, StreamOutcome, StreamState,
};
pub use sentinel::{SentinelExtractor, SentinelMode};

/// A request whose response body is streamed back as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRequest {
    Generate(GenerateRequest),
    Chat { note_id: NoteId, request: ChatRequest },
}

impl StreamRequest {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            StreamRequest::Generate(_) => Endpoint::GenerateNote,
            StreamRequest::Chat { note_id, .. } => Endpoint::ChatWithNote(*note_id),
        }
    }

    pub fn body(&self) -> serde_json::Value {
        let body = match self {
            StreamRequest::Generate(req) => serde_json::to_value(req),
            StreamRequest::Chat { request, .. } => serde_json::to_value(request),
        };
        body.unwrap_or(serde_json::Value::Null)
    }
}

/// Opens streaming requests against the backend.
///
/// Implementations must check the response status before handing back the
/// body, mapping failures through [`AppError::from_status`], so that an
/// unauthorized response never yields a stream.
#[allow(async_fn_in_trait)]
pub trait StreamTransport {
    type Chunk: AsRef<[u8]>;
    type Body: Stream<Item = Result<Self::Chunk, AppError>>;

    async fn open(
        &self,
        request: &StreamRequest,
        credential: &Credential,
    ) -> Result<Self::Body, AppError>;
}

/// Opens `request` behind the auth gate and ingests the response.
///
/// An unauthorized open goes through the gate's refresh-and-retry; if that
/// fails the session ends `Errored` without reading a single chunk.
pub async fn run_session<B, S, T, O>(
    gate: &AuthGate<B, S>,
    transport: &T,
    request: &StreamRequest,
    observer: &mut O,
    cancel: &CancelToken,
    mode: SentinelMode,
) -> StreamOutcome
where
    B: AuthBackend,
    S: CredentialStore,
    T: StreamTransport,
    O: StreamObserver,
{
    let opened = gate
        .authorized(|credential| async move { transport.open(request, &credential).await })
        .await;
    ingest(opened, observer, cancel, mode).await
}
