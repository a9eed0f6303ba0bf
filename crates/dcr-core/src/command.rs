//! Free-form chat text → structured remote command.
//!
//! Accepted forms (after `@handle` mentions are removed and the text trimmed):
//! - `/record [secs]`, `record [secs]`, `录制[secs]` → [`Command::Record`]
//! - `/photo`, `photo`, `拍照` → [`Command::Photo`]
//! - `/help`, `/start`, `帮助` → [`Command::Help`]
//! - `/status`, `状态` → [`Command::Status`]
//!
//! English keywords of `record`/`photo` match ASCII case-insensitively; every
//! other keyword matches exactly.

use std::sync::OnceLock;

use regex::Regex;

pub const DEFAULT_RECORD_SECONDS: u32 = 60;
pub const MIN_RECORD_SECONDS: u32 = 5;
pub const MAX_RECORD_SECONDS: u32 = 600;

const RECORD_KEYWORDS: [&str; 3] = ["/record", "record", "录制"];
const PHOTO_KEYWORDS: [&str; 3] = ["/photo", "photo", "拍照"];
const HELP_KEYWORDS: [&str; 3] = ["/help", "/start", "帮助"];
const STATUS_KEYWORDS: [&str; 2] = ["/status", "状态"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Record { duration_seconds: u32 },
    Photo,
    Help,
    Status,
    Unrecognized,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Record { .. } => "record",
            Command::Photo => "photo",
            Command::Help => "help",
            Command::Status => "status",
            Command::Unrecognized => "unrecognized",
        }
    }
}

pub fn parse_command(text: &str) -> Command {
    let cleaned = strip_mentions(text);
    let cleaned = cleaned.trim();

    if let Some(rest) = RECORD_KEYWORDS
        .iter()
        .find_map(|kw| strip_keyword_prefix(cleaned, kw))
    {
        return Command::Record {
            duration_seconds: parse_record_duration(rest),
        };
    }

    if PHOTO_KEYWORDS
        .iter()
        .any(|kw| strip_keyword_prefix(cleaned, kw) == Some(""))
    {
        return Command::Photo;
    }
    if HELP_KEYWORDS.contains(&cleaned) {
        return Command::Help;
    }
    if STATUS_KEYWORDS.contains(&cleaned) {
        return Command::Status;
    }

    Command::Unrecognized
}

/// Remove `@botname` style mentions anywhere in the text.
fn strip_mentions(text: &str) -> String {
    static MENTION: OnceLock<Regex> = OnceLock::new();
    let re = MENTION.get_or_init(|| Regex::new(r"@\S+").expect("valid regex"));
    re.replace_all(text, "").into_owned()
}

/// Strip `keyword` from the front of `text`.
///
/// ASCII keywords compare case-insensitively, others byte-exact.
fn strip_keyword_prefix<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    if !keyword.is_ascii() {
        return text.strip_prefix(keyword);
    }
    let head = text.get(..keyword.len())?;
    if head.eq_ignore_ascii_case(keyword) {
        Some(&text[keyword.len()..])
    } else {
        None
    }
}

fn parse_record_duration(rest: &str) -> u32 {
    let rest = rest.trim();
    if rest.is_empty() {
        return DEFAULT_RECORD_SECONDS;
    }
    match rest.parse::<i64>() {
        Ok(secs) => secs.clamp(MIN_RECORD_SECONDS as i64, MAX_RECORD_SECONDS as i64) as u32,
        Err(_) => {
            tracing::warn!(
                remainder = rest,
                "unparseable record duration, using default"
            );
            DEFAULT_RECORD_SECONDS
        }
    }
}
