//! Annotation-block extraction from model answers.
//!
//! A block is any element carrying an `id` attribute, e.g.
//! `<div id="keywords"><li>rain</li></div>`. The id prefix selects the kind:
//! `keyword*` and `song*` blocks hold `<li>` items, `music*` blocks hold a JSON
//! object `{"note": [...], "duration": [...], "bpm": n}`. Everything else is ignored.

use crate::text::markup_text;
use crate::types::{MusicSpec, StructuredResponse};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Keywords,
    Songs,
    Music,
}

impl BlockKind {
    pub fn from_id(id: &str) -> Option<Self> {
        if id.starts_with("keyword") {
            Some(Self::Keywords)
        } else if id.starts_with("song") {
            Some(Self::Songs)
        } else if id.starts_with("music") {
            Some(Self::Music)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationBlock<'a> {
    pub id: &'a str,
    pub kind: BlockKind,
    /// Raw markup between the opening and the matching closing tag.
    pub body: &'a str,
}

#[derive(Debug, Error)]
pub enum MusicBlockError {
    #[error("music block does not match {{note, duration, bpm}}: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("music block has no notes")]
    Empty,

    #[error("note and duration lists differ in length ({notes} vs {durations})")]
    LengthMismatch { notes: usize, durations: usize },

    #[error("duration at index {index} is not a finite non-negative number")]
    InvalidDuration { index: usize },

    #[error("bpm must be a positive integer, got {0}")]
    InvalidBpm(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MusicBlock {
    note: Vec<String>,
    duration: Vec<f64>,
    bpm: serde_json::Number,
}

fn open_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<([A-Za-z][A-Za-z0-9-]*)\b([^>]*)>").expect("valid open tag regex")
    })
}

fn id_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)id\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#)
            .expect("valid id attribute regex")
    })
}

fn li_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<li\b[^>]*>").expect("valid li regex"))
}

fn li_close_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</li\s*>").expect("valid li close regex"))
}

/// Finds every recognized block in document order.
///
/// Elements of the same tag nested inside a block are balanced when locating its end.
/// A block whose closing tag is missing runs to the end of the text.
pub fn scan_blocks(text: &str) -> Vec<AnnotationBlock<'_>> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(caps) = open_tag_re().captures_at(text, pos) {
        let whole = caps.get(0).map_or(pos..text.len(), |m| m.range());
        pos = whole.end;

        let attrs = caps.get(2).map_or("", |m| m.as_str());
        if attrs.trim_end().ends_with('/') {
            continue;
        }
        let Some(id) = id_attr(attrs) else {
            continue;
        };
        let Some(kind) = BlockKind::from_id(id) else {
            continue;
        };

        let tag = caps.get(1).map_or("", |m| m.as_str());
        let body_end = matching_close(text, tag, whole.end).unwrap_or(text.len());
        blocks.push(AnnotationBlock {
            id,
            kind,
            body: &text[whole.end..body_end],
        });
    }

    blocks
}

fn id_attr(attrs: &str) -> Option<&str> {
    let caps = id_attr_re().captures(attrs)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}

fn any_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9-]*)\b([^>]*)>").expect("valid tag regex")
    })
}

// Byte offset of the closing tag that balances an element opened just before `from`.
fn matching_close(text: &str, tag: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    for caps in any_tag_re().captures_iter(&text[from..]) {
        let name = caps.get(2)?.as_str();
        if !name.eq_ignore_ascii_case(tag) {
            continue;
        }
        let m = caps.get(0)?;
        let closing = caps.get(1).is_some_and(|c| !c.as_str().is_empty());
        if closing {
            depth -= 1;
            if depth == 0 {
                return Some(from + m.start());
            }
        } else if !caps.get(3).is_some_and(|a| a.as_str().trim_end().ends_with('/')) {
            depth += 1;
        }
    }
    None
}

/// Text of each `<li>` item in a list block, normalized to trimmed lowercase.
///
/// An item without `</li>` ends at the next `<li>` or at the end of the block.
pub fn list_items(body: &str) -> Vec<String> {
    let opens: Vec<(usize, usize)> = li_open_re()
        .find_iter(body)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut items = Vec::with_capacity(opens.len());
    for (i, &(_, content_start)) in opens.iter().enumerate() {
        let limit = opens.get(i + 1).map_or(body.len(), |&(next, _)| next);
        let region = &body[content_start..limit];
        let content = li_close_re()
            .find(region)
            .map_or(region, |m| &region[..m.start()]);

        let item = markup_text(content).trim().to_lowercase();
        if !item.is_empty() {
            items.push(item);
        }
    }
    items
}

/// Strictly decodes a music block body. Any deviation from the expected shape is an error.
pub fn parse_music_block(body: &str) -> Result<MusicSpec, MusicBlockError> {
    let text = markup_text(body);
    let block: MusicBlock = serde_json::from_str(text.trim())?;

    if block.note.is_empty() {
        return Err(MusicBlockError::Empty);
    }
    if block.note.len() != block.duration.len() {
        return Err(MusicBlockError::LengthMismatch {
            notes: block.note.len(),
            durations: block.duration.len(),
        });
    }
    if let Some(index) = block
        .duration
        .iter()
        .position(|d| !d.is_finite() || *d < 0.0)
    {
        return Err(MusicBlockError::InvalidDuration { index });
    }

    Ok(MusicSpec {
        notes: block.note.into_iter().map(|n| n.trim().to_string()).collect(),
        durations: block.duration,
        bpm: parse_bpm(&block.bpm)?,
    })
}

// Fractional tempos are truncated toward zero.
fn parse_bpm(n: &serde_json::Number) -> Result<u32, MusicBlockError> {
    let invalid = || MusicBlockError::InvalidBpm(n.to_string());
    let bpm = match n.as_u64() {
        Some(v) => v,
        None => {
            let f = n.as_f64().filter(|f| f.is_finite()).ok_or_else(invalid)?;
            if f < 1.0 {
                return Err(invalid());
            }
            f.trunc() as u64
        }
    };
    match u32::try_from(bpm) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(invalid()),
    }
}

/// Extracts keywords, song titles and the first music block from a model answer.
///
/// Never fails: a malformed music block is logged and yields `music: None`.
pub fn extract_structured_response(text: &str) -> StructuredResponse {
    let mut resp = StructuredResponse::default();
    let mut music_seen = false;

    for block in scan_blocks(text) {
        match block.kind {
            BlockKind::Keywords => resp.keywords.extend(list_items(block.body)),
            BlockKind::Songs => resp.songs.extend(list_items(block.body)),
            BlockKind::Music if !music_seen => {
                music_seen = true;
                match parse_music_block(block.body) {
                    Ok(spec) => resp.music = Some(spec),
                    Err(e) => log::warn!("ignoring malformed music block `{}`: {e}", block.id),
                }
            }
            BlockKind::Music => {
                log::debug!("ignoring extra music block `{}`", block.id);
            }
        }
    }

    resp
}
