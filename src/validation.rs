//! Checks on user input. Everything here runs before a request is issued,
//! so a rejected value never costs a network round-trip.

use crate::errors::AppError;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_MESSAGE_LENGTH: usize = 8000;

fn bounded<'a>(value: &'a str, field_name: &str, max_length: usize) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::empty_field(field_name));
    }
    let actual_length = trimmed.chars().count();
    if actual_length > max_length {
        return Err(AppError::FieldTooLong {
            field_name: field_name.to_string(),
            max_length,
            actual_length,
        });
    }
    Ok(trimmed)
}

/// Returns the trimmed video URL.
pub fn validate_video_url(url: &str) -> Result<String, AppError> {
    bounded(url, "url", MAX_URL_LENGTH).map(str::to_string)
}

/// Returns the trimmed chat message.
pub fn validate_chat_message(message: &str) -> Result<String, AppError> {
    bounded(message, "message", MAX_MESSAGE_LENGTH).map(str::to_string)
}

pub fn validate_login(email: &str, password: &str) -> Result<(), AppError> {
    if email.trim().is_empty() {
        return Err(AppError::empty_field("email"));
    }
    if password.is_empty() {
        return Err(AppError::empty_field("password"));
    }
    Ok(())
}

pub fn validate_registration(email: &str, username: &str, password: &str) -> Result<(), AppError> {
    validate_login(email, password)?;
    if username.trim().is_empty() {
        return Err(AppError::empty_field("username"));
    }
    Ok(())
}
