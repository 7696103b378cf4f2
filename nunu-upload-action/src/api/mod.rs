mod models;
pub use models::*;

use crate::error::{ActionError, TransferError};
use crate::installer::InstallerConfig;
use indicatif::ProgressStyle;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode, Url};
use std::path::Path;
use tokio::io::AsyncWriteExt as _;
use tracing_indicatif::span_ext::IndicatifSpanExt as _;

/// Client for the release index and asset store of the CLI repository.
#[derive(Debug, Clone)]
pub struct ReleaseApi {
    client: Client,
    api_base: Url,
    download_base: Url,
    owner: String,
    repo: String,
    token: Option<String>,
}

impl ReleaseApi {
    /// Prepare the API client.
    pub fn new(config: &InstallerConfig) -> Result<Self, ActionError> {
        for (input, base) in [
            ("api url", &config.api_base),
            ("download url", &config.download_base),
        ] {
            if base.cannot_be_a_base() {
                return Err(ActionError::InvalidInput {
                    input,
                    message: format!("{} cannot be used as a base url", base),
                });
            }
        }

        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .redirect(Policy::limited(10))
            .hickory_dns(true)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            download_base: config.download_base.clone(),
            owner: config.repo_owner.clone(),
            repo: config.repo_name.clone(),
            token: config.github_token.clone(),
        })
    }

    /// Query the most recent published release.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_latest_release(&self) -> Result<ReleaseDescriptor, ActionError> {
        let url = Self::path(
            &self.api_base,
            [
                "repos",
                self.owner.as_str(),
                self.repo.as_str(),
                "releases",
                "latest",
            ],
        );
        tracing::debug!("Fetching latest release from: {}", url);

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ActionError::RemoteLookup(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ActionError::RemoteLookup(status.as_u16().to_string()));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| ActionError::RemoteLookup(e.to_string()))?;

        serde_json::from_slice(&data)
            .map_err(|e| ActionError::RemoteLookup(format!("{}: {}", status.as_u16(), e)))
    }

    /// Location of a release asset for the given tag.
    pub fn asset_url(&self, tag: &str, asset_name: &str) -> Url {
        Self::path(
            &self.download_base,
            [
                self.owner.as_str(),
                self.repo.as_str(),
                "releases",
                "download",
                tag,
                asset_name,
            ],
        )
    }

    /// Stream the asset at `url` into `dest`, returning the number of bytes
    /// written.
    #[tracing::instrument(skip_all, fields(url = url.as_str()))]
    pub async fn download_to(&self, url: &Url, dest: &Path) -> Result<u64, ActionError> {
        let download_error = |source: TransferError| ActionError::Download {
            url: url.to_string(),
            source,
        };

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|e| download_error(e.into()))?;

        let span = tracing::Span::current();
        if let Some(length) = response.content_length() {
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner} {bytes}/{total_bytes} {wide_bar} {eta}",
            ) {
                span.pb_set_style(&style);
            }
            span.pb_set_length(length);
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| download_error(e.into()))?;
        let mut written = 0;

        while let Some(chunk) = response.chunk().await.map_err(|e| download_error(e.into()))? {
            file.write_all(&chunk)
                .await
                .map_err(|e| download_error(e.into()))?;
            written += chunk.len() as u64;
            span.pb_inc(chunk.len() as u64);
        }

        file.flush().await.map_err(|e| download_error(e.into()))?;
        tracing::debug!("Downloaded {} bytes to {}", written, dest.display());

        Ok(written)
    }

    fn path<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut new_path = base.clone();
        if let Ok(mut path) = new_path.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }

        new_path
    }
}
