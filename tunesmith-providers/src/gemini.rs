use crate::request::{Body, HttpRequest, build_url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tunesmith_core::prompt::SafetySetting;

#[derive(Clone, PartialEq)]
pub struct GeminiRequestConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl std::fmt::Debug for GeminiRequestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiRequestConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FileData(FileData),
}

/// One chat message as the `generateContent` endpoint expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: "user".into(),
            parts,
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: "model".into(),
            parts: vec![Part::Text(text.into())],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub display_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub fn build_generate_content_request(
    cfg: &GeminiRequestConfig,
    system_instruction: &str,
    safety: &[SafetySetting],
    contents: &[Content],
) -> anyhow::Result<HttpRequest> {
    let url = build_url(
        &cfg.base_url,
        &format!("/v1beta/models/{}:generateContent", cfg.model),
        &[("key", cfg.api_key.as_str())],
    )?;

    let payload = json!({
        "systemInstruction": { "parts": [{ "text": system_instruction }] },
        "contents": contents,
        "safetySettings": safety,
        "generationConfig": { "temperature": cfg.temperature },
    });

    Ok(HttpRequest {
        method: "POST".into(),
        url,
        headers: vec![("Content-Type".into(), "application/json".into())],
        body: Body::Json(payload.to_string()),
    })
}

/// Single-request media upload (`multipart/related`: JSON metadata, then the file bytes).
pub fn build_file_upload_request(
    cfg: &GeminiRequestConfig,
    file: &UploadFile,
) -> anyhow::Result<HttpRequest> {
    let url = build_url(&cfg.base_url, "/upload/v1beta/files", &[("key", cfg.api_key.as_str())])?;
    let boundary = format!("Boundary-{}", uuid::Uuid::new_v4());

    let metadata = json!({ "file": { "displayName": file.display_name } });

    let mut body: Vec<u8> = Vec::new();
    append_part(
        &mut body,
        &boundary,
        "application/json; charset=UTF-8",
        metadata.to_string().as_bytes(),
    );
    append_part(&mut body, &boundary, &file.mime_type, &file.bytes);
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    Ok(HttpRequest {
        method: "POST".into(),
        url,
        headers: vec![
            ("X-Goog-Upload-Protocol".into(), "multipart".into()),
            (
                "Content-Type".into(),
                format!("multipart/related; boundary={}", boundary),
            ),
        ],
        body: Body::Multipart {
            boundary,
            bytes: body,
        },
    })
}

fn append_part(body: &mut Vec<u8>, boundary: &str, content_type: &str, bytes: &[u8]) {
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
}

/// Best guess at a mime type: content sniffing first, then the file extension.
pub fn guess_mime_type(file_name: &str, bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> GeminiRequestConfig {
        GeminiRequestConfig {
            base_url: "https://gen.example.com/".into(),
            api_key: "g-key".into(),
            model: "gemini-1.5-pro-latest".into(),
            temperature: 0.9,
        }
    }

    #[test]
    fn builds_generate_content_request() {
        let contents = vec![Content::user(vec![
            Part::Text("hello".into()),
            Part::FileData(FileData {
                mime_type: "image/png".into(),
                file_uri: "https://files/abc".into(),
            }),
        ])];
        let safety = vec![SafetySetting {
            category: "HARM_CATEGORY_HARASSMENT".into(),
            threshold: "BLOCK_NONE".into(),
        }];
        let req = build_generate_content_request(&cfg(), "be helpful", &safety, &contents).unwrap();

        assert_eq!(req.method, "POST");
        assert!(
            req.url
                .starts_with("https://gen.example.com/v1beta/models/gemini-1.5-pro-latest:generateContent")
        );
        assert_eq!(req.query_param("key").as_deref(), Some("g-key"));

        let Body::Json(s) = req.body else {
            panic!("expected json");
        };
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert_eq!(v["contents"][0]["role"], "user");
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(
            v["contents"][0]["parts"][1]["fileData"]["fileUri"],
            "https://files/abc"
        );
        assert_eq!(v["safetySettings"][0]["threshold"], "BLOCK_NONE");
    }

    #[test]
    fn builds_multipart_related_upload() {
        let file = UploadFile {
            display_name: "cover.png".into(),
            mime_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        let req = build_file_upload_request(&cfg(), &file).unwrap();
        assert!(req.url.contains("/upload/v1beta/files"));
        assert_eq!(req.header("x-goog-upload-protocol"), Some("multipart"));
        assert!(
            req.header("content-type")
                .unwrap()
                .starts_with("multipart/related; boundary=")
        );

        match req.body {
            Body::Multipart { bytes, boundary } => {
                let s = String::from_utf8_lossy(&bytes);
                assert!(s.contains("\"displayName\":\"cover.png\""));
                assert!(s.contains("Content-Type: image/png"));
                assert!(s.ends_with(&format!("--{boundary}--\r\n")));
            }
            _ => panic!("expected multipart"),
        }
    }

    #[test]
    fn mime_type_sniffs_then_falls_back_to_extension() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(guess_mime_type("noext", &png_magic), "image/png");
        assert_eq!(guess_mime_type("clip.MP4", b"??"), "video/mp4");
        assert_eq!(guess_mime_type("blob", b"??"), "application/octet-stream");
    }
}
