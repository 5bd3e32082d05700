use async_trait::async_trait;
use std::path::Path;
use tunesmith_core::catalog::{AccessToken, AlbumItem};
use tunesmith_core::types::UploadedContent;

/// A multi-turn conversation with the generative model.
///
/// Implementations keep their own chat history; the session only ever talks to one
/// instance at a time.
#[async_trait]
pub trait InferenceChat: Send + Sync {
    /// Hands a persisted attachment to the inference service.
    async fn upload(&mut self, path: &Path) -> anyhow::Result<UploadedContent>;

    /// Sends the instruction plus uploaded content and returns the model's answer text.
    async fn send(
        &mut self,
        instruction: &str,
        content: &[UploadedContent],
    ) -> anyhow::Result<String>;

    async fn close(&mut self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Client-credentials exchange against the catalog's auth endpoint.
    async fn exchange_token(&self) -> anyhow::Result<AccessToken>;

    /// Album search; hits in ranking order, possibly empty.
    async fn search_albums(
        &self,
        token: &AccessToken,
        query: &str,
    ) -> anyhow::Result<Vec<AlbumItem>>;
}

/// Builds the per-session collaborators on first submit.
#[async_trait]
pub trait CollaboratorFactory: Send + Sync {
    async fn open_chat(&self) -> anyhow::Result<Box<dyn InferenceChat>>;

    fn catalog_client(&self) -> anyhow::Result<Box<dyn CatalogClient>>;
}
