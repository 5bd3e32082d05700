use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
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

/// A short melody: pitch tokens paired with inter-onset durations.
///
/// Durations are in whole-note units (`0.25` is a quarter note).
/// `notes.len() == durations.len()` and `bpm > 0` hold for every value built by
/// the extractor; the synthesizer re-checks both because the fields are public.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicSpec {
    pub notes: Vec<String>,
    pub durations: Vec<f64>,
    pub bpm: u32,
}

impl MusicSpec {
    pub fn is_well_formed(&self) -> bool {
        !self.notes.is_empty() && self.notes.len() == self.durations.len() && self.bpm > 0
    }
}

/// Typed fields pulled out of one model answer.
///
/// `music` is `None` when no music block was present or the first one was malformed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub keywords: BTreeSet<String>,
    pub songs: BTreeSet<String>,
    pub music: Option<MusicSpec>,
}

impl StructuredResponse {
    /// Terms to look up in the catalog: song titles first, then keywords, each once.
    pub fn search_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self.songs.iter().cloned().collect();
        for keyword in &self.keywords {
            if !self.songs.contains(keyword) {
                terms.push(keyword.clone());
            }
        }
        terms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistLink {
    pub name: String,
    pub url: String,
}

/// Catalog metadata for one album hit. Identity is `album_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub artists: Vec<ArtistLink>,
    pub album_id: String,
    pub title: String,
    pub url: String,
    pub release_date: String,
    pub image_url: Option<String>,
}

/// One completed submission cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub attachments: Vec<PathBuf>,
    pub response_text: String,
    pub music_artifact_path: PathBuf,
    pub resolved_songs: Vec<SongMetadata>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

/// Reference to a file already handed to the inference service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedContent {
    pub uri: String,
    pub mime_type: String,
    pub display_name: String,
}
