//! Per-run session identifiers.
//!
//! A session id looks like `20261016T142233123-1a2b3c4d5e6f`: a UTC
//! timestamp with millisecond precision followed by 48 random bits.
//! Every file written during one render embeds the same id.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of random hex characters in the suffix.
pub const SESSION_RANDOM_HEX_LEN: usize = 12;

const TIME_FORMAT: &str = "%Y%m%dT%H%M%S%3f";
/// `YYYYMMDD` + `T` + `HHMMSSmmm`
const TIME_PART_LEN: usize = 18;
/// Total length of a formatted session id.
pub const SESSION_ID_LEN: usize = TIME_PART_LEN + 1 + SESSION_RANDOM_HEX_LEN;

/// Opaque token scoping all file names of one render.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new session id from the current time.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Generate a session id for the given instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}",
            now.format(TIME_FORMAT),
            &random[..SESSION_RANDOM_HEX_LEN]
        ))
    }

    /// Parse a string that must be exactly one session id.
    pub fn parse(s: &str) -> Option<Self> {
        if is_session_id(s) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    /// Find the first session id embedded anywhere in `text`.
    pub fn find_in(text: &str) -> Option<Self> {
        if text.len() < SESSION_ID_LEN {
            return None;
        }
        (0..=text.len() - SESSION_ID_LEN)
            .filter(|&start| {
                text.is_char_boundary(start) && text.is_char_boundary(start + SESSION_ID_LEN)
            })
            .map(|start| &text[start..start + SESSION_ID_LEN])
            .find(|candidate| is_session_id(candidate))
            .map(|s| Self(s.to_string()))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_session_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != SESSION_ID_LEN {
        return false;
    }

    let (time, rest) = bytes.split_at(TIME_PART_LEN);
    let date_ok = time[..8].iter().all(u8::is_ascii_digit);
    let sep_ok = time[8] == b'T';
    let clock_ok = time[9..].iter().all(u8::is_ascii_digit);
    let dash_ok = rest[0] == b'-';
    let random_ok = rest[1..]
        .iter()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b));

    date_ok && sep_ok && clock_ok && dash_ok && random_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_id_format() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 14, 22, 33).unwrap();
        let id = SessionId::at(now);
        assert!(id.as_str().starts_with("20261016T142233000-"));
        assert_eq!(id.as_str().len(), SESSION_ID_LEN);
        assert_eq!(SessionId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn test_session_ids_differ() {
        let now = Utc::now();
        assert_ne!(SessionId::at(now), SessionId::at(now));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SessionId::parse("not-a-session").is_none());
        assert!(SessionId::parse("20261016X142233123-1a2b3c4d5e6f").is_none());
        assert!(SessionId::parse("20261016T142233123-1A2B3C4D5E6F").is_none());
    }

    #[test]
    fn test_find_in_filename() {
        let id = SessionId::new();
        let name = format!("voiceover_{}_alt.mp3", id);
        assert_eq!(SessionId::find_in(&name), Some(id));
        assert!(SessionId::find_in("video.mp4").is_none());
    }
}
