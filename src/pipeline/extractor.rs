//! Query extractor — turns one digest body into per-query records.
//!
//! 1. Find every line that starts with `Summary:` (case-insensitive, leading
//!    spaces/tabs allowed) and cut the body right before each label. The text
//!    before the first label becomes a leading block of its own.
//! 2. Drop blocks shorter than [`MIN_BLOCK_CHARS`] once trimmed.
//! 3. Pull `Summary:`, `Category:`, `Query:` and `Email:` out of each block,
//!    never looking across block boundaries. The query text runs until
//!    `Requirements:`, a line starting with `Email:`, or the end of the block.
//!
//! Missing labels produce empty fields (`reply_to` becomes `None`); nothing
//! here can fail.

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::types::QueryRecord;

/// Label that starts every query block (compared lowercase).
const BLOCK_LABEL: &str = "summary:";

/// Blocks with fewer trimmed characters than this are treated as noise.
pub const MIN_BLOCK_CHARS: usize = 20;

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| label_line_regex("summary"));
static CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| label_line_regex("category"));
static QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)query:(.*?)(?:requirements:|(?m:^)[ \t]*email:|\z)")
        .expect("static query regex")
});
// Only a line-leading label counts; the address must be on the same line.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*email:[ \t]*(\S+)").expect("static email regex")
});

fn label_line_regex(label: &str) -> Regex {
    // `.` stops at '\n', so the capture is the rest of the label's line.
    Regex::new(&format!(r"(?i){label}:(.*)")).expect("static label regex")
}

/// Extract every query block from a digest body, in body order.
pub fn extract_queries(body: &str) -> Vec<QueryRecord> {
    split_blocks(body)
        .into_iter()
        .filter(|block| block.trim().chars().count() >= MIN_BLOCK_CHARS)
        .map(parse_block)
        .collect()
}

/// Byte offsets where a `Summary:` label begins a line.
pub fn block_starts(body: &str) -> Vec<usize> {
    // ASCII lowercasing keeps byte offsets identical to `body`.
    let lower = body.to_ascii_lowercase();
    let mut starts = Vec::new();
    let mut line_start = 0;

    for line in lower.split_inclusive('\n') {
        let content = line.trim_start_matches([' ', '\t']);
        if content.starts_with(BLOCK_LABEL) {
            starts.push(line_start + (line.len() - content.len()));
        }
        line_start += line.len();
    }

    starts
}

/// Slice `body` between consecutive label offsets.
///
/// Always returns `starts.len() + 1` slices; the first is whatever precedes
/// the first label (possibly empty).
pub fn split_blocks(body: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut prev = 0;
    for start in block_starts(body) {
        blocks.push(&body[prev..start]);
        prev = start;
    }
    blocks.push(&body[prev..]);
    blocks
}

/// Extract the four fields from a single block.
fn parse_block(block: &str) -> QueryRecord {
    QueryRecord {
        title: capture(&TITLE_RE, block).unwrap_or_default(),
        publication: capture(&CATEGORY_RE, block).unwrap_or_default(),
        query_text: capture(&QUERY_RE, block).unwrap_or_default(),
        reply_to: capture(&EMAIL_RE, block),
    }
}

fn capture(re: &Regex, block: &str) -> Option<String> {
    re.captures(block)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}
