use serde::{Deserialize, Serialize};
use indexmap::IndexMap;

/// Link kind to url, in the order the catalog listed them.
pub type UrlMap = IndexMap<String, String>;

/// Bearer token from the client-credentials exchange.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken(pub String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistItem {
    pub name: String,
    #[serde(default)]
    pub external_urls: UrlMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
    pub url: String,
}

/// One album entry of a catalog search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistItem>,
    #[serde(default)]
    pub external_urls: UrlMap,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub images: Vec<ImageItem>,
}
