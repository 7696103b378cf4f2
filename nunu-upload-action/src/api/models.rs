use reqwest::Url;
use serde::Deserialize;

/// A published release as reported by the release index.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDescriptor {
    pub tag_name: String,

    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: Url,
}
