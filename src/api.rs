use crate::models::NoteId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Every backend operation the client calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    GenerateNote,
    ListNotes,
    GetNote(NoteId),
    ChatWithNote(NoteId),
    ChatHistory(NoteId),
    ExportPdf,
    Login,
    Register,
    Logout,
    RefreshToken,
    TokenUsage,
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::ListNotes
            | Endpoint::GetNote(_)
            | Endpoint::ChatHistory(_)
            | Endpoint::TokenUsage => Method::Get,
            Endpoint::GenerateNote
            | Endpoint::ChatWithNote(_)
            | Endpoint::ExportPdf
            | Endpoint::Login
            | Endpoint::Register
            | Endpoint::Logout
            | Endpoint::RefreshToken => Method::Post,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::GenerateNote => "/notes/generate".to_string(),
            Endpoint::ListNotes => "/notes/".to_string(),
            Endpoint::GetNote(id) => format!("/notes/{id}"),
            Endpoint::ChatWithNote(id) => format!("/notes/{id}/chat"),
            Endpoint::ChatHistory(id) => format!("/notes/{id}/chat/history"),
            Endpoint::ExportPdf => "/exports/export/pdf".to_string(),
            Endpoint::Login => "/auth/login".to_string(),
            Endpoint::Register => "/auth/register".to_string(),
            Endpoint::Logout => "/auth/logout".to_string(),
            Endpoint::RefreshToken => "/auth/refresh-token".to_string(),
            Endpoint::TokenUsage => "/auth/token-usage".to_string(),
        }
    }

    /// Whether the request carries the bearer credential.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Endpoint::Login | Endpoint::Register | Endpoint::RefreshToken)
    }

    /// Whether the response body is streamed text rather than one document.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Endpoint::GenerateNote | Endpoint::ChatWithNote(_))
    }

    pub fn url(&self, api_base: &str) -> String {
        format!("{}{}", api_base.trim_end_matches('/'), self.path())
    }
}
