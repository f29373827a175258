use futures_util::StreamExt;
use futures_util::stream::LocalBoxStream;
use gloo_net::http::{Request, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use notesbuddy::api::{Endpoint, Method};
use notesbuddy::models::{
    ChatMessage, ExportRequest, LoginRequest, Note, NoteId, RefreshRequest, RegisterRequest,
    TokenResponse, TokenUsage, User, Validate, parse_validated,
};
use notesbuddy::stream::{StreamRequest, StreamTransport};
use notesbuddy::{AppError, AuthBackend, Credential};

use crate::stream::body_chunks;

/// HTTP client for the NotesBuddy backend.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    api_base: String,
}

impl HttpBackend {
    pub fn new(api_base: &str) -> Self {
        Self { api_base: api_base.trim_end_matches('/').to_string() }
    }

    fn builder(&self, endpoint: Endpoint, credential: Option<&Credential>) -> RequestBuilder {
        let url = endpoint.url(&self.api_base);
        let builder = match endpoint.method() {
            Method::Get => Request::get(&url),
            Method::Post => Request::post(&url),
        };
        match credential {
            Some(credential) if endpoint.requires_auth() => {
                builder.header("Authorization", &credential.bearer())
            }
            _ => builder,
        }
    }

    async fn send(
        &self,
        endpoint: Endpoint,
        credential: Option<&Credential>,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, AppError> {
        log::debug!("{} {}", endpoint.method().as_str(), endpoint.path());
        let builder = self.builder(endpoint, credential);
        let sent = match body {
            Some(body) => {
                builder
                    .json(body)
                    .map_err(|e| AppError::Unexpected(format!("Serialize error: {e}")))?
                    .send()
                    .await
            }
            None => builder.send().await,
        };
        sent.map_err(|e| AppError::transport(e.to_string()))
    }

    async fn read_body(resp: &Response) -> Result<String, AppError> {
        resp.text().await.map_err(|e| AppError::transport(e.to_string()))
    }

    /// Fetches and validates a JSON document from an authenticated endpoint.
    async fn fetch_json<T>(&self, endpoint: Endpoint, credential: &Credential) -> Result<T, AppError>
    where
        T: DeserializeOwned + Validate,
    {
        let resp = self.send(endpoint, Some(credential), None).await?;
        let body = Self::read_body(&resp).await?;
        if !resp.ok() {
            return Err(AppError::from_status(resp.status(), &body));
        }
        parse_validated(&body)
    }

    pub async fn list_notes(&self, credential: &Credential) -> Result<Vec<Note>, AppError> {
        self.fetch_json(Endpoint::ListNotes, credential).await
    }

    pub async fn get_note(&self, id: NoteId, credential: &Credential) -> Result<Note, AppError> {
        self.fetch_json(Endpoint::GetNote(id), credential).await
    }

    pub async fn chat_history(
        &self,
        id: NoteId,
        credential: &Credential,
    ) -> Result<Vec<ChatMessage>, AppError> {
        self.fetch_json(Endpoint::ChatHistory(id), credential).await
    }

    pub async fn token_usage(&self, credential: &Credential) -> Result<TokenUsage, AppError> {
        self.fetch_json(Endpoint::TokenUsage, credential).await
    }

    /// Asks the backend to render `notes` as a PDF.
    pub async fn export_pdf(&self, notes: &str, credential: &Credential) -> Result<Vec<u8>, AppError> {
        let body = serde_json::to_value(ExportRequest { notes: notes.to_string() })
            .map_err(|e| AppError::Unexpected(format!("Serialize error: {e}")))?;
        let resp = self.send(Endpoint::ExportPdf, Some(credential), Some(&body)).await?;
        if !resp.ok() {
            let text = Self::read_body(&resp).await.unwrap_or_default();
            return Err(AppError::from_status(resp.status(), &text));
        }
        resp.binary().await.map_err(|e| AppError::transport(e.to_string()))
    }

    /// Credential exchanges: a 401 here means the submitted credentials were
    /// wrong, so the backend's detail is kept.
    async fn exchange<T>(
        &self,
        endpoint: Endpoint,
        body: &serde_json::Value,
    ) -> Result<T, AppError>
    where
        T: DeserializeOwned + Validate,
    {
        let resp = self.send(endpoint, None, Some(body)).await?;
        let text = Self::read_body(&resp).await?;
        if !resp.ok() {
            return Err(AppError::credential_rejected(resp.status(), &text));
        }
        parse_validated(&text)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Unexpected(format!("Serialize error: {e}")))
}

impl AuthBackend for HttpBackend {
    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, AppError> {
        self.exchange(Endpoint::Login, &to_json(request)?).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, AppError> {
        self.exchange(Endpoint::Register, &to_json(request)?).await
    }

    async fn refresh(&self, credential: &Credential) -> Result<TokenResponse, AppError> {
        let body = to_json(&RefreshRequest { refresh_token: credential.refresh_token.clone() })?;
        let resp = self.send(Endpoint::RefreshToken, None, Some(&body)).await?;
        let text = Self::read_body(&resp).await?;
        if !resp.ok() {
            return Err(AppError::from_status(resp.status(), &text));
        }
        parse_validated(&text)
    }

    async fn logout(&self, credential: &Credential) -> Result<(), AppError> {
        let resp = self.send(Endpoint::Logout, Some(credential), None).await?;
        if !resp.ok() {
            let text = Self::read_body(&resp).await.unwrap_or_default();
            return Err(AppError::from_status(resp.status(), &text));
        }
        Ok(())
    }
}

impl StreamTransport for HttpBackend {
    type Chunk = Vec<u8>;
    type Body = LocalBoxStream<'static, Result<Vec<u8>, AppError>>;

    async fn open(
        &self,
        request: &StreamRequest,
        credential: &Credential,
    ) -> Result<Self::Body, AppError> {
        let resp = self
            .send(request.endpoint(), Some(credential), Some(&request.body()))
            .await?;
        if !resp.ok() {
            let text = Self::read_body(&resp).await.unwrap_or_default();
            return Err(AppError::from_status(resp.status(), &text));
        }
        let body = resp.body().ok_or_else(|| AppError::transport("No response body"))?;
        Ok(body_chunks(body).boxed_local())
    }
}
