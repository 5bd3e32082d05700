use crate::catalog::{CatalogResolver, SearchPolicy};
use crate::synth::MusicSynthesizer;
use crate::traits::{CollaboratorFactory, InferenceChat};
use crate::workspace::Workspace;
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tunesmith_core::config::PipelineConfig;
use tunesmith_core::extract::extract_structured_response;
use tunesmith_core::prompt::USER_INSTRUCTION;
use tunesmith_core::types::{Attachment, SessionId, TurnRecord};

const STAGE_IDLE: &str = "idle";
const STAGE_UPLOADING: &str = "uploading";
const STAGE_AWAITING_MODEL: &str = "awaiting_model_response";
const STAGE_EXTRACTING: &str = "extracting";
const STAGE_SYNTHESIZING: &str = "synthesizing";
const STAGE_RESOLVING: &str = "resolving";
const STAGE_RECORDED: &str = "recorded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnStage {
    Idle,
    Uploading,
    AwaitingModelResponse,
    Extracting,
    Synthesizing,
    Resolving,
    Recorded,
}

impl TurnStage {
    // A stable string label for progress display.
    // This is intentionally not derived from `Debug`.
    pub fn label(self) -> &'static str {
        match self {
            TurnStage::Idle => STAGE_IDLE,
            TurnStage::Uploading => STAGE_UPLOADING,
            TurnStage::AwaitingModelResponse => STAGE_AWAITING_MODEL,
            TurnStage::Extracting => STAGE_EXTRACTING,
            TurnStage::Synthesizing => STAGE_SYNTHESIZING,
            TurnStage::Resolving => STAGE_RESOLVING,
            TurnStage::Recorded => STAGE_RECORDED,
        }
    }
}

/// One user's conversation: turn history, uploads workspace and collaborators.
///
/// Turns run strictly one after another (`submit` takes `&mut self`). Collaborators are
/// built on the first submit and live until `reset`.
pub struct Session {
    id: SessionId,
    workspace: Workspace,
    factory: Arc<dyn CollaboratorFactory>,
    synthesizer: MusicSynthesizer,
    policy: SearchPolicy,

    chat: Option<Box<dyn InferenceChat>>,
    resolver: Option<CatalogResolver>,
    history: Vec<TurnRecord>,
    stage: TurnStage,
    started: bool,
    submissions: u64,
}

impl Session {
    pub fn new(
        workspace: Workspace,
        factory: Arc<dyn CollaboratorFactory>,
        cfg: &PipelineConfig,
    ) -> Self {
        Self {
            id: SessionId::new(),
            workspace,
            factory,
            synthesizer: MusicSynthesizer::from_config(cfg),
            policy: SearchPolicy::from(cfg),
            chat: None,
            resolver: None,
            history: Vec::new(),
            stage: TurnStage::Idle,
            started: false,
            submissions: 0,
        }
    }

    /// Creates a session whose workspace is a fresh subdirectory of `base_dir`.
    pub fn open(
        base_dir: &Path,
        factory: Arc<dyn CollaboratorFactory>,
        cfg: &PipelineConfig,
    ) -> anyhow::Result<Self> {
        let id = SessionId::new();
        let workspace = Workspace::for_session(base_dir, &id)?;
        let mut session = Self::new(workspace, factory, cfg);
        session.id = id;
        Ok(session)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn history(&self) -> &[TurnRecord] {
        &self.history
    }

    pub fn stage(&self) -> TurnStage {
        self.stage
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Total submits seen by this session, including failed ones. Not cleared by `reset`.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    /// Runs one full turn (upload -> model -> extract -> synthesize -> resolve -> record).
    pub async fn submit(&mut self, attachments: Vec<Attachment>) -> anyhow::Result<&TurnRecord> {
        self.submit_with_hook(attachments, |_stage| async {}).await
    }

    /// Same as `submit`, but emits a stage hook as the turn progresses.
    ///
    /// The hook is intended for UI progress and must be fast.
    pub async fn submit_with_hook<F, Fut>(
        &mut self,
        attachments: Vec<Attachment>,
        on_stage: F,
    ) -> anyhow::Result<&TurnRecord>
    where
        F: Fn(&'static str) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.submissions += 1;
        log::info!("session {} submission #{}", self.id, self.submissions);

        let result = self.run_turn(attachments, &on_stage).await;

        // Success or not, the session is ready for the next turn.
        self.stage = TurnStage::Idle;
        on_stage(STAGE_IDLE).await;

        match result {
            Ok(()) => self
                .history
                .last()
                .ok_or_else(|| anyhow!("turn finished without a record")),
            Err(e) => {
                log::warn!("turn aborted: {e:#}");
                Err(e)
            }
        }
    }

    async fn run_turn<F, Fut>(
        &mut self,
        attachments: Vec<Attachment>,
        on_stage: &F,
    ) -> anyhow::Result<()>
    where
        F: Fn(&'static str) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.ensure_started().await?;
        let chat = self
            .chat
            .as_mut()
            .ok_or_else(|| anyhow!("inference chat not initialized"))?;
        let resolver = self
            .resolver
            .as_ref()
            .ok_or_else(|| anyhow!("catalog resolver not initialized"))?;

        // 1) Upload
        self.stage = TurnStage::Uploading;
        on_stage(STAGE_UPLOADING).await;

        let mut paths = Vec::with_capacity(attachments.len());
        let mut uploads = Vec::with_capacity(attachments.len());
        for attachment in &attachments {
            let path = self.workspace.persist(attachment)?;
            let uploaded = chat
                .upload(&path)
                .await
                .with_context(|| format!("upload {}", path.display()))?;
            paths.push(path);
            uploads.push(uploaded);
        }

        // 2) Ask the model
        self.stage = TurnStage::AwaitingModelResponse;
        on_stage(STAGE_AWAITING_MODEL).await;

        let response_text = chat
            .send(USER_INSTRUCTION, &uploads)
            .await
            .context("inference request")?;

        // 3) Extract
        self.stage = TurnStage::Extracting;
        on_stage(STAGE_EXTRACTING).await;

        let structured = extract_structured_response(&response_text);
        log::debug!(
            "extracted {} keywords, {} songs, music={}",
            structured.keywords.len(),
            structured.songs.len(),
            structured.music.is_some()
        );

        // 4) Synthesize (failures fall back to the bare artifact name)
        self.stage = TurnStage::Synthesizing;
        on_stage(STAGE_SYNTHESIZING).await;

        let music_artifact_path = self
            .synthesizer
            .synthesize(structured.music.as_ref(), &self.workspace);

        // 5) Resolve
        self.stage = TurnStage::Resolving;
        on_stage(STAGE_RESOLVING).await;

        let resolved_songs = resolver.resolve(&structured.search_terms()).await?;

        // 6) Record
        self.stage = TurnStage::Recorded;
        on_stage(STAGE_RECORDED).await;

        self.history.push(TurnRecord {
            attachments: paths,
            response_text,
            music_artifact_path,
            resolved_songs,
        });
        log::info!("turn {} recorded", self.history.len());
        Ok(())
    }

    // Either both collaborators are installed or neither is.
    async fn ensure_started(&mut self) -> anyhow::Result<()> {
        if self.started {
            return Ok(());
        }

        let mut chat = self
            .factory
            .open_chat()
            .await
            .context("open inference chat")?;

        let connected = match self.factory.catalog_client() {
            Ok(client) => CatalogResolver::connect(client, self.policy.clone()).await,
            Err(e) => Err(e.context("build catalog client")),
        };
        let resolver = match connected {
            Ok(r) => r,
            Err(e) => {
                if let Err(close_err) = chat.close().await {
                    log::warn!("closing inference chat failed: {close_err:#}");
                }
                return Err(e);
            }
        };

        self.chat = Some(chat);
        self.resolver = Some(resolver);
        self.started = true;
        log::info!("session {} collaborators initialized", self.id);
        Ok(())
    }

    /// Drops history, collaborators and every file in the workspace.
    pub async fn reset(&mut self) -> anyhow::Result<()> {
        if let Some(mut chat) = self.chat.take() {
            if let Err(e) = chat.close().await {
                log::warn!("closing inference chat failed: {e:#}");
            }
        }
        if let Some(resolver) = self.resolver.take() {
            resolver.close();
        }

        self.history.clear();
        self.started = false;
        self.stage = TurnStage::Idle;

        let removed = self.workspace.clear()?;
        log::info!("session {} reset, {removed} workspace entries removed", self.id);
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("workspace", &self.workspace)
            .field("stage", &self.stage)
            .field("started", &self.started)
            .field("turns", &self.history.len())
            .finish()
    }
}
