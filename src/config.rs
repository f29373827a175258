//! Client configuration.
//!
//! Values come from `NOTESBUDDY_*` variables. Natively they are read from the
//! process environment; the browser build bakes them in at compile time and
//! passes them through [`ClientConfig::from_lookup`].

use std::str::FromStr;

use crate::errors::ConfigError;
use crate::models::NoteStyle;
use crate::stream::SentinelMode;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api/v1";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base: String,
    pub default_language: String,
    pub default_style: NoteStyle,
    pub chat_width_min: f64,
    pub chat_width_max: f64,
    pub chat_width_initial: f64,
    pub sentinel_mode: SentinelMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            default_language: "en".to_string(),
            default_style: NoteStyle::Detailed,
            chat_width_min: 280.0,
            chat_width_max: 720.0,
            chat_width_initial: 400.0,
            sentinel_mode: SentinelMode::Buffered,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), format!("'{raw}' cannot be parsed"))),
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from a variable lookup; unset variables keep
    /// their defaults, blank ones count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let api_base = get("NOTESBUDDY_API_BASE")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base);
        if !(api_base.starts_with("http://") || api_base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "NOTESBUDDY_API_BASE".to_string(),
                format!("'{api_base}' is not an http(s) URL"),
            ));
        }

        let default_language = get("NOTESBUDDY_DEFAULT_LANGUAGE")
            .map(|v| v.trim().to_lowercase())
            .unwrap_or(defaults.default_language);
        let default_style = get("NOTESBUDDY_DEFAULT_STYLE")
            .map(|v| NoteStyle::from(v.trim().to_string()))
            .unwrap_or(defaults.default_style);

        let chat_width_min =
            parse_var("NOTESBUDDY_CHAT_WIDTH_MIN", get("NOTESBUDDY_CHAT_WIDTH_MIN"), defaults.chat_width_min)?;
        let chat_width_max =
            parse_var("NOTESBUDDY_CHAT_WIDTH_MAX", get("NOTESBUDDY_CHAT_WIDTH_MAX"), defaults.chat_width_max)?;
        let chat_width_initial =
            parse_var("NOTESBUDDY_CHAT_WIDTH", get("NOTESBUDDY_CHAT_WIDTH"), defaults.chat_width_initial)?;
        if !(chat_width_min > 0.0 && chat_width_min <= chat_width_max) {
            return Err(ConfigError::InvalidValue(
                "NOTESBUDDY_CHAT_WIDTH_MIN".to_string(),
                format!("{chat_width_min} must be positive and not above {chat_width_max}"),
            ));
        }
        if !(chat_width_min..=chat_width_max).contains(&chat_width_initial) {
            return Err(ConfigError::InvalidValue(
                "NOTESBUDDY_CHAT_WIDTH".to_string(),
                format!("{chat_width_initial} is outside {chat_width_min}..={chat_width_max}"),
            ));
        }

        let sentinel_mode = match get("NOTESBUDDY_SENTINEL_MODE") {
            Some(raw) => raw.parse::<SentinelMode>()?,
            None => defaults.sentinel_mode,
        };

        Ok(Self {
            api_base,
            default_language,
            default_style,
            chat_width_min,
            chat_width_max,
            chat_width_initial,
            sentinel_mode,
        })
    }
}
