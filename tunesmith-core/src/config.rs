use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SEARCH_DELAY_MS: u64 = 200;
pub const DEFAULT_LOOP_REPEAT: usize = 2;

/// Tempo-to-playback conversion applied when rendering: the file tempo is `bpm * 4`.
pub const PLAYBACK_MULTIPLIER: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause between consecutive catalog searches.
    pub search_delay_ms: u64,
    /// How many times the melody is concatenated to form the loop.
    pub loop_repeat: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_delay_ms: DEFAULT_SEARCH_DELAY_MS,
            loop_repeat: DEFAULT_LOOP_REPEAT,
        }
    }
}

impl PipelineConfig {
    pub fn search_delay(&self) -> Duration {
        Duration::from_millis(self.search_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-1.5-pro-latest".into(),
            temperature: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub auth_base_url: String,
    pub api_base_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            auth_base_url: "https://accounts.spotify.com/api".into(),
            api_base_url: "https://api.spotify.com/v1".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub catalog: CatalogConfig,
    pub pipeline: PipelineConfig,

    // Each session gets its own subdirectory under this root.
    pub workspace_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            catalog: CatalogConfig::default(),
            pipeline: PipelineConfig::default(),
            workspace_dir: PathBuf::from("uploads"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"pipeline":{"search_delay_ms":0}}"#).unwrap();
        assert_eq!(cfg.pipeline.search_delay_ms, 0);
        assert_eq!(cfg.pipeline.loop_repeat, DEFAULT_LOOP_REPEAT);
        assert_eq!(cfg.catalog, CatalogConfig::default());
        assert_eq!(cfg.workspace_dir, PathBuf::from("uploads"));
    }
}
