use anyhow::Context;
use std::path::Path;
use tunesmith_core::config::GeminiConfig;
use tunesmith_core::prompt::{SYSTEM_INSTRUCTION, SafetySetting, safety_settings};
use tunesmith_core::types::UploadedContent;
use tunesmith_engine::traits::InferenceChat;
use tunesmith_providers::gemini::{
    Content, FileData, GeminiRequestConfig, Part, UploadFile, build_file_upload_request,
    build_generate_content_request, guess_mime_type,
};
use tunesmith_providers::parse::{parse_file_upload, parse_generate_content};
use tunesmith_providers::runtime::execute;

/// Multi-turn chat against the `generateContent` endpoint.
///
/// The full history is resent on every turn; only successful exchanges are kept.
pub struct GeminiChat {
    cfg: GeminiRequestConfig,
    safety: Vec<SafetySetting>,
    history: Vec<Content>,
}

impl std::fmt::Debug for GeminiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiChat")
            .field("cfg", &self.cfg)
            .field("turns", &(self.history.len() / 2))
            .finish()
    }
}

impl GeminiChat {
    pub fn new(cfg: &GeminiConfig, api_key: impl Into<String>) -> Self {
        Self {
            cfg: GeminiRequestConfig {
                base_url: cfg.base_url.clone(),
                api_key: api_key.into(),
                model: cfg.model.clone(),
                temperature: cfg.temperature,
            },
            safety: safety_settings(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }
}

#[async_trait::async_trait]
impl InferenceChat for GeminiChat {
    async fn upload(&mut self, path: &Path) -> anyhow::Result<UploadedContent> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("read attachment: {}", path.display()))?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = guess_mime_type(&display_name, &bytes);
        log::debug!("uploading {display_name} ({mime_type}, {} bytes)", bytes.len());

        let req = build_file_upload_request(
            &self.cfg,
            &UploadFile {
                display_name,
                mime_type,
                bytes,
            },
        )?;
        let resp = execute(&req).await?.error_for_status("Gemini file upload")?;
        parse_file_upload(&resp.body)
    }

    async fn send(
        &mut self,
        instruction: &str,
        content: &[UploadedContent],
    ) -> anyhow::Result<String> {
        let mut parts = Vec::with_capacity(content.len() + 1);
        parts.push(Part::Text(instruction.to_string()));
        parts.extend(content.iter().map(|c| {
            Part::FileData(FileData {
                mime_type: c.mime_type.clone(),
                file_uri: c.uri.clone(),
            })
        }));
        let user = Content::user(parts);

        let mut contents = self.history.clone();
        contents.push(user.clone());

        let req =
            build_generate_content_request(&self.cfg, SYSTEM_INSTRUCTION, &self.safety, &contents)?;
        let resp = execute(&req)
            .await?
            .error_for_status("Gemini generateContent")?;
        let text = parse_generate_content(&resp.body)?;

        self.history.push(user);
        self.history.push(Content::model_text(text.clone()));
        Ok(text)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        log::info!("closing Gemini chat after {} turns", self.history.len() / 2);
        self.history.clear();
        Ok(())
    }
}
