use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Identifier the backend assigns to a stored note.
pub type NoteId = i64;

// ── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub url: String,
    pub language: String,
    pub style: NoteStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRequest {
    pub notes: String,
}

// ── Notes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NoteStyle {
    Detailed,
    Concise,
    Bullet,
    Other(String),
}

impl NoteStyle {
    pub fn as_str(&self) -> &str {
        match self {
            NoteStyle::Detailed => "detailed",
            NoteStyle::Concise => "concise",
            NoteStyle::Bullet => "bullet",
            NoteStyle::Other(s) => s,
        }
    }

    /// Styles offered in the generation form.
    pub fn choices() -> [NoteStyle; 3] {
        [NoteStyle::Detailed, NoteStyle::Concise, NoteStyle::Bullet]
    }
}

impl std::fmt::Display for NoteStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for NoteStyle {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "detailed" => NoteStyle::Detailed,
            "concise" => NoteStyle::Concise,
            "bullet" | "bullets" => NoteStyle::Bullet,
            _ => NoteStyle::Other(s),
        }
    }
}

impl From<NoteStyle> for String {
    fn from(style: NoteStyle) -> Self {
        style.as_str().to_string()
    }
}

/// A generated note as the backend returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub video_id: String,
    pub title: String,
    pub notes: String,
    pub language: String,
    pub style: NoteStyle,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// First `max_chars` characters of the body, with an ellipsis when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.notes.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{head}…")
        } else {
            head
        }
    }
}

// ── Chat ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into(), created_at: Some(Utc::now()) }
    }
}

// ── Auth ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Daily token accounting for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    pub tokens_used: u64,
    #[serde(default)]
    pub daily_limit: Option<u64>,
    #[serde(default)]
    pub remaining: Option<u64>,
}

impl TokenUsage {
    /// Remaining quota, derived from the limit when the backend omits it.
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
            .or_else(|| self.daily_limit.map(|limit| limit.saturating_sub(self.tokens_used)))
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// The backend's error body: `{"detail": "..."}` or a list of field issues.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    pub detail: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Issues(Vec<ValidationIssue>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationIssue {
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    pub msg: String,
}

impl ErrorPayload {
    /// Extracts a one-line detail from an error body, if there is one.
    pub fn detail_from_body(body: &str) -> Option<String> {
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        match serde_json::from_str::<ErrorPayload>(body) {
            Ok(payload) => Some(payload.detail.render()),
            Err(_) => Some(body.to_string()),
        }
    }
}

impl ErrorDetail {
    pub fn render(&self) -> String {
        match self {
            ErrorDetail::Message(msg) => msg.clone(),
            ErrorDetail::Issues(issues) => issues
                .iter()
                .map(|issue| {
                    let field = issue
                        .loc
                        .iter()
                        .filter(|v| v.as_str() != Some("body"))
                        .map(|v| match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(".");
                    if field.is_empty() {
                        issue.msg.clone()
                    } else {
                        format!("{field}: {}", issue.msg)
                    }
                })
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

// ── Boundary validation ──────────────────────────────────────────────────────

/// Checks a deserialised backend response before any field is trusted.
pub trait Validate {
    fn validate(&self) -> Result<(), AppError>;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), AppError> {
        self.iter().try_for_each(Validate::validate)
    }
}

fn require_non_empty(value: &str, what: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_response(format!("{what} is empty")));
    }
    Ok(())
}

impl Validate for Note {
    fn validate(&self) -> Result<(), AppError> {
        if self.id <= 0 {
            return Err(AppError::invalid_response(format!("note id {} is not positive", self.id)));
        }
        require_non_empty(&self.video_id, "note video_id")?;
        require_non_empty(&self.title, "note title")?;
        require_non_empty(&self.language, "note language")
    }
}

impl Validate for ChatMessage {
    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }
}

impl Validate for TokenResponse {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty(&self.access_token, "access_token")?;
        if !self.token_type.eq_ignore_ascii_case("bearer") {
            return Err(AppError::invalid_response(format!(
                "unsupported token_type '{}'",
                self.token_type
            )));
        }
        Ok(())
    }
}

impl Validate for User {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty(&self.email, "user email")?;
        require_non_empty(&self.username, "user username")
    }
}

impl Validate for TokenUsage {
    fn validate(&self) -> Result<(), AppError> {
        if let (Some(limit), Some(remaining)) = (self.daily_limit, self.remaining) {
            if remaining > limit {
                return Err(AppError::invalid_response(format!(
                    "remaining quota {remaining} exceeds daily limit {limit}"
                )));
            }
        }
        Ok(())
    }
}

/// Deserialises a response body and validates it in one step.
pub fn parse_validated<T>(body: &str) -> Result<T, AppError>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_str(body)
        .map_err(|e| AppError::invalid_response(format!("Parse error: {e}")))?;
    value.validate()?;
    Ok(value)
}

/// Backend timestamps come either RFC 3339 or naive (UTC implied).
mod timestamp {
    use super::*;
    use serde::Deserializer;

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'"))),
        }
    }
}
