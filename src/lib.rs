//! Client core for NotesBuddy: turns YouTube videos into study notes by
//! talking to the NotesBuddy backend.
//!
//! Everything here is platform-neutral so it runs both in the browser build
//! (`notesbuddy-web`) and under native tests.

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod errors;
pub mod export;
pub mod layout;
pub mod models;
pub mod stream;
pub mod validation;

pub use auth::{AuthBackend, AuthGate, Credential, CredentialStore, MemoryStore, SessionReader};
pub use config::ClientConfig;
pub use errors::{AppError, ConfigError};
