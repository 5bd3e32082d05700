use anyhow::Context;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tunesmith_core::catalog::{AccessToken, AlbumItem};
use tunesmith_core::config::PipelineConfig;
use tunesmith_core::text::title_case;
use tunesmith_core::types::{ArtistLink, SongMetadata};

use crate::traits::CatalogClient;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no catalog match for {0:?}")]
    NoMatch(String),

    #[error("{what} of album {album_id} has no external url")]
    MissingUrl { what: String, album_id: String },
}

/// Pacing for consecutive catalog searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPolicy {
    pub search_delay: Duration,
}

impl From<&PipelineConfig> for SearchPolicy {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            search_delay: cfg.search_delay(),
        }
    }
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// Maps a search hit to display metadata. Urls are the first entry of each url map.
pub fn song_metadata_from_album(item: AlbumItem) -> Result<SongMetadata, CatalogError> {
    let mut artists = Vec::with_capacity(item.artists.len());
    for artist in item.artists {
        let url = artist
            .external_urls
            .into_values()
            .next()
            .ok_or_else(|| CatalogError::MissingUrl {
                what: format!("artist {:?}", artist.name),
                album_id: item.id.clone(),
            })?;
        artists.push(ArtistLink {
            name: artist.name,
            url,
        });
    }

    let url = item
        .external_urls
        .into_values()
        .next()
        .ok_or_else(|| CatalogError::MissingUrl {
            what: "album".into(),
            album_id: item.id.clone(),
        })?;

    Ok(SongMetadata {
        artists,
        title: title_case(&item.name),
        url,
        release_date: item.release_date,
        image_url: item.images.into_iter().next().map(|i| i.url),
        album_id: item.id,
    })
}

/// Resolves search terms to album metadata with a token obtained once at construction.
///
/// The token is never refreshed; a resolver that outlives it fails its searches.
pub struct CatalogResolver {
    client: Box<dyn CatalogClient>,
    token: AccessToken,
    policy: SearchPolicy,
}

impl std::fmt::Debug for CatalogResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogResolver")
            .field("token", &self.token)
            .field("policy", &self.policy)
            .finish()
    }
}

impl CatalogResolver {
    pub async fn connect(
        client: Box<dyn CatalogClient>,
        policy: SearchPolicy,
    ) -> anyhow::Result<Self> {
        let token = client
            .exchange_token()
            .await
            .context("catalog token exchange")?;
        log::info!("catalog resolver connected");
        Ok(Self {
            client,
            token,
            policy,
        })
    }

    /// Looks up every term in order, one request at a time.
    ///
    /// The first hit of each search is kept unless its album was already returned by an
    /// earlier term. A term with no hit fails the whole call.
    pub async fn resolve(&self, terms: &[String]) -> anyhow::Result<Vec<SongMetadata>> {
        log::debug!("resolving {} catalog terms", terms.len());
        let mut seen = HashSet::new();
        let mut songs = Vec::new();

        for (i, term) in terms.iter().enumerate() {
            if i > 0 && !self.policy.search_delay.is_zero() {
                tokio::time::sleep(self.policy.search_delay).await;
            }

            let hit = self
                .client
                .search_albums(&self.token, term)
                .await
                .with_context(|| format!("catalog search for {term:?}"))?
                .into_iter()
                .next()
                .ok_or_else(|| CatalogError::NoMatch(term.clone()))?;

            let song = song_metadata_from_album(hit)?;
            if seen.insert(song.album_id.clone()) {
                songs.push(song);
            } else {
                log::debug!("dropping duplicate album {} for {term:?}", song.album_id);
            }
        }

        log::info!("{} catalog songs resolved", songs.len());
        Ok(songs)
    }

    pub fn close(self) {
        log::info!("catalog resolver closed");
    }
}
