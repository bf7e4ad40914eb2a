//! Input parsing for the dialogue.
//!
//! Splits raw messages into slash commands and free text, and reads the
//! small structured answers the add-member dialogue asks for.

use std::sync::LazyLock;

use regex::Regex;

use kinship_core::error::KinshipError;
use kinship_core::types::RelationType;

static COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(\w+)(?:@\w+)?(?:\s+(.*))?$").unwrap());

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());

static INDEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,3}$").unwrap());

/// Answers meaning "I don't know" / "none".
const SKIP_WORDS: &[&str] = &["-", "skip", "none", "unknown"];

/// A parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// `/name args`; the name is lower-cased, args are trimmed.
    Command { name: String, args: String },
    Text(String),
}

pub fn parse_input(raw: &str) -> Input {
    let trimmed = raw.trim();
    match COMMAND_RE.captures(trimmed) {
        Some(caps) => Input::Command {
            name: caps[1].to_ascii_lowercase(),
            args: caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        },
        None => Input::Text(trimmed.to_string()),
    }
}

fn is_skip(text: &str) -> bool {
    SKIP_WORDS.iter().any(|w| text.eq_ignore_ascii_case(w))
}

/// A four-digit year, or `None` when the user skips. Range checks are left
/// to the member validator.
pub fn parse_year(text: &str) -> Result<Option<i32>, KinshipError> {
    let text = text.trim();
    if is_skip(text) {
        return Ok(None);
    }
    if !YEAR_RE.is_match(text) {
        return Err(KinshipError::Validation(format!(
            "'{}' is not a year; send four digits or '-' to skip",
            text
        )));
    }
    text.parse::<i32>()
        .map(Some)
        .map_err(|e| KinshipError::Validation(e.to_string()))
}

pub fn parse_relation(text: &str) -> Result<RelationType, KinshipError> {
    text.parse::<RelationType>().map_err(KinshipError::Validation)
}

/// A 1-based choice from a list of `len` options, or `None` when the user
/// skips.
pub fn parse_choice(text: &str, len: usize) -> Result<Option<usize>, KinshipError> {
    let text = text.trim();
    if is_skip(text) {
        return Ok(None);
    }
    let out_of_range = || {
        KinshipError::Validation(format!("choose a number from 1 to {}, or '-' for none", len))
    };
    if !INDEX_RE.is_match(text) {
        return Err(out_of_range());
    }
    match text.parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Ok(Some(n - 1)),
        _ => Err(out_of_range()),
    }
}
