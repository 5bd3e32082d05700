use crate::catalog::SpotifyCatalogClient;
use crate::credentials::Credentials;
use crate::gemini::GeminiChat;
use tunesmith_core::config::AppConfig;
use tunesmith_engine::traits::{CatalogClient, CollaboratorFactory, InferenceChat};

/// Builds the real Gemini chat and Spotify client from config and credentials.
///
/// Credentials are checked lazily, so a session can be created (and reset) without them.
#[derive(Debug, Clone)]
pub struct RuntimeCollaborators {
    cfg: AppConfig,
    credentials: Credentials,
}

impl RuntimeCollaborators {
    pub fn new(cfg: AppConfig, credentials: Credentials) -> Self {
        Self { cfg, credentials }
    }
}

#[async_trait::async_trait]
impl CollaboratorFactory for RuntimeCollaborators {
    async fn open_chat(&self) -> anyhow::Result<Box<dyn InferenceChat>> {
        let api_key = self.credentials.google_api_key()?;
        log::info!("opening Gemini chat with model {}", self.cfg.gemini.model);
        Ok(Box::new(GeminiChat::new(&self.cfg.gemini, api_key)))
    }

    fn catalog_client(&self) -> anyhow::Result<Box<dyn CatalogClient>> {
        let creds = self.credentials.spotify()?;
        Ok(Box::new(SpotifyCatalogClient::new(
            self.cfg.catalog.clone(),
            creds,
        )))
    }
}
