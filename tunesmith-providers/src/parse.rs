use anyhow::{Context, anyhow};
use serde::Deserialize;
use tunesmith_core::catalog::{AccessToken, AlbumItem};
use tunesmith_core::types::UploadedContent;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Text of the first candidate, all text parts concatenated.
pub fn parse_generate_content(body: &[u8]) -> anyhow::Result<String> {
    let resp: GenerateContentResponse =
        serde_json::from_slice(body).context("decode generateContent JSON")?;

    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(anyhow!("prompt was blocked: {reason}"));
    }

    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no candidates in generateContent response"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(anyhow!("empty candidate (finish reason: {reason})"));
    }
    Ok(text)
}

#[derive(Debug, Deserialize)]
struct FileUploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    uri: String,
    mime_type: String,
    #[serde(default)]
    display_name: String,
}

pub fn parse_file_upload(body: &[u8]) -> anyhow::Result<UploadedContent> {
    let resp: FileUploadResponse =
        serde_json::from_slice(body).context("decode file upload JSON")?;
    Ok(UploadedContent {
        uri: resp.file.uri,
        mime_type: resp.file.mime_type,
        display_name: resp.file.display_name,
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub fn parse_access_token(body: &[u8]) -> anyhow::Result<AccessToken> {
    let resp: TokenResponse = serde_json::from_slice(body).context("decode token JSON")?;
    if resp.access_token.trim().is_empty() {
        return Err(anyhow!("token response carried an empty access_token"));
    }
    Ok(AccessToken(resp.access_token))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    albums: AlbumPage,
}

#[derive(Debug, Deserialize)]
struct AlbumPage {
    #[serde(default)]
    items: Vec<AlbumItem>,
}

/// Album hits in ranking order. An empty list is not an error at this layer.
pub fn parse_album_search(body: &[u8]) -> anyhow::Result<Vec<AlbumItem>> {
    let resp: SearchResponse = serde_json::from_slice(body).context("decode search JSON")?;
    Ok(resp.albums.items)
}
