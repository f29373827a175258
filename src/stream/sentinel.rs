//! Extraction of the `<!-- NOTE_ID: N -->` marker the backend embeds in a
//! generation stream to announce the id of the note it just stored.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::errors::ConfigError;
use crate::models::NoteId;

pub const MARKER_OPEN: &str = "<!-- NOTE_ID: ";
pub const MARKER_CLOSE: &str = " -->";

/// Longest digit run that can still be an `i64`.
const MAX_ID_DIGITS: usize = 19;

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"<!-- NOTE_ID: ([0-9]+) -->").expect("marker pattern is valid"))
}

/// How markers that straddle chunk boundaries are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SentinelMode {
    /// Each chunk is matched on its own. A marker split across two chunks
    /// is neither captured nor removed.
    PerChunk,
    /// A suffix that may still grow into a marker is held back until the next
    /// chunk decides it, so split markers are captured too.
    #[default]
    Buffered,
}

impl FromStr for SentinelMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per-chunk" | "per_chunk" | "perchunk" => Ok(SentinelMode::PerChunk),
            "buffered" => Ok(SentinelMode::Buffered),
            other => Err(ConfigError::InvalidValue(
                "NOTESBUDDY_SENTINEL_MODE".to_string(),
                format!("'{other}' is not one of per-chunk, buffered"),
            )),
        }
    }
}

/// Output of one extraction step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    /// Text safe to show, markers removed.
    pub text: String,
    /// Set only on the step that first captured an id.
    pub note_id: Option<NoteId>,
}

#[derive(Debug)]
pub struct SentinelExtractor {
    mode: SentinelMode,
    held: String,
    captured: Option<NoteId>,
}

impl SentinelExtractor {
    pub fn new(mode: SentinelMode) -> Self {
        Self { mode, held: String::new(), captured: None }
    }

    pub fn mode(&self) -> SentinelMode {
        self.mode
    }

    pub fn captured(&self) -> Option<NoteId> {
        self.captured
    }

    pub fn push(&mut self, chunk: &str) -> Extracted {
        match self.mode {
            SentinelMode::PerChunk => self.strip(chunk),
            SentinelMode::Buffered => {
                let mut buffer = std::mem::take(&mut self.held);
                buffer.push_str(chunk);
                let Extracted { text, note_id } = self.strip(&buffer);
                let cut = partial_marker_start(&text).unwrap_or(text.len());
                self.held = text[cut..].to_string();
                if !self.held.is_empty() {
                    debug!(held = self.held.len(), "holding possible marker prefix");
                }
                Extracted { text: text[..cut].to_string(), note_id }
            }
        }
    }

    /// Releases whatever was held back. An unfinished marker is plain text.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.held)
    }

    fn strip(&mut self, text: &str) -> Extracted {
        let mut out = String::with_capacity(text.len());
        let mut note_id = None;
        let mut last = 0;
        for caps in marker_regex().captures_iter(text) {
            let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Ok(id) = digits.as_str().parse::<NoteId>() else {
                warn!(digits = digits.as_str(), "note id marker out of range; leaving it as text");
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            last = whole.end();
            match self.captured {
                None => {
                    self.captured = Some(id);
                    note_id = Some(id);
                }
                Some(first) => warn!(first, duplicate = id, "ignoring repeated note id marker"),
            }
        }
        out.push_str(&text[last..]);
        Extracted { text: out, note_id }
    }
}

/// Index of the earliest `<` whose suffix could still become a marker.
fn partial_marker_start(text: &str) -> Option<usize> {
    text.match_indices('<')
        .map(|(i, _)| i)
        .find(|&i| is_marker_prefix(&text[i..]))
}

/// True when `s` is a strict prefix of some well-formed marker.
fn is_marker_prefix(s: &str) -> bool {
    if s.len() <= MARKER_OPEN.len() {
        return MARKER_OPEN.starts_with(s);
    }
    let Some(rest) = s.strip_prefix(MARKER_OPEN) else {
        return false;
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits > MAX_ID_DIGITS {
        return false;
    }
    let tail = &rest[digits..];
    tail.len() < MARKER_CLOSE.len() && MARKER_CLOSE.starts_with(tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(mode: SentinelMode, chunks: &[&str]) -> (String, Vec<NoteId>) {
        let mut ex = SentinelExtractor::new(mode);
        let mut text = String::new();
        let mut ids = Vec::new();
        for chunk in chunks {
            let step = ex.push(chunk);
            text.push_str(&step.text);
            ids.extend(step.note_id);
        }
        text.push_str(&ex.finish());
        (text, ids)
    }

    #[test]
    fn marker_within_one_chunk_is_stripped_and_captured() {
        for mode in [SentinelMode::PerChunk, SentinelMode::Buffered] {
            let (text, ids) = run(mode, &["<!-- NOTE_ID: 42 -->Hello"]);
            assert_eq!(text, "Hello");
            assert_eq!(ids, vec![42]);
        }
    }

    #[test]
    fn buffered_mode_captures_marker_split_at_any_point() {
        let full = "Intro <!-- NOTE_ID: 1337 --> body";
        for split in 1..full.len() {
            let (text, ids) = run(SentinelMode::Buffered, &[&full[..split], &full[split..]]);
            assert_eq!(text, "Intro  body", "split at {split}");
            assert_eq!(ids, vec![1337], "split at {split}");
        }
    }

    #[test]
    fn buffered_mode_handles_marker_spread_over_many_chunks() {
        let full = "<!-- NOTE_ID: 9 -->x";
        let chunks: Vec<String> = full.chars().map(String::from).collect();
        let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        assert_eq!(run(SentinelMode::Buffered, &refs), ("x".to_string(), vec![9]));
    }

    #[test]
    fn per_chunk_mode_keeps_split_marker_visible() {
        let (text, ids) = run(SentinelMode::PerChunk, &["a <!-- NOTE_", "ID: 5 --> b"]);
        assert_eq!(text, "a <!-- NOTE_ID: 5 --> b");
        assert!(ids.is_empty());
    }

    #[test]
    fn only_first_marker_is_captured_but_all_are_stripped() {
        let (text, ids) =
            run(SentinelMode::Buffered, &["<!-- NOTE_ID: 1 -->a", "b<!-- NOTE_ID: 2 -->"]);
        assert_eq!(text, "ab");
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn out_of_range_marker_stays_in_text() {
        let raw = "<!-- NOTE_ID: 99999999999999999999 -->";
        let (text, ids) = run(SentinelMode::Buffered, &[raw]);
        assert_eq!(text, raw);
        assert!(ids.is_empty());
    }

    #[test]
    fn unrelated_angle_brackets_are_not_held() {
        let mut ex = SentinelExtractor::new(SentinelMode::Buffered);
        assert_eq!(ex.push("if a < b then <b>bold</b>").text, "if a < b then <b>bold</b>");
        assert_eq!(ex.finish(), "");
    }

    #[test]
    fn possible_prefix_is_held_until_resolved() {
        let mut ex = SentinelExtractor::new(SentinelMode::Buffered);
        assert_eq!(ex.push("text <!-").text, "text ");
        // An ordinary HTML comment resolves the held text as plain output.
        assert_eq!(ex.push("- note -->").text, "<!-- note -->");
        assert_eq!(ex.captured(), None);
    }

    #[test]
    fn unfinished_marker_is_released_at_end() {
        let (text, ids) = run(SentinelMode::Buffered, &["done <!-- NOTE_ID: 12"]);
        assert_eq!(text, "done <!-- NOTE_ID: 12");
        assert!(ids.is_empty());
    }

    #[test]
    fn non_ascii_digits_are_not_a_marker() {
        for mode in [SentinelMode::PerChunk, SentinelMode::Buffered] {
            let (text, ids) = run(mode, &["a <!-- NOTE_ID: \u{664}\u{662} -->b"]);
            assert_eq!(text, "a <!-- NOTE_ID: \u{664}\u{662} -->b");
            assert!(ids.is_empty());
        }
    }

    #[test]
    fn mode_parses_from_config_strings() {
        assert_eq!("per-chunk".parse::<SentinelMode>().unwrap(), SentinelMode::PerChunk);
        assert_eq!(" Buffered ".parse::<SentinelMode>().unwrap(), SentinelMode::Buffered);
        assert!("sometimes".parse::<SentinelMode>().is_err());
    }
}
