use crate::api::ReleaseApi;
use crate::args::ActionArgs;
use crate::cache::{CacheKey, ToolCache};
use crate::error::ActionError;
use crate::platform::{Architecture, Platform};
use reqwest::Url;
use std::fmt;
use std::path::{Path, PathBuf};

pub const TOOL_NAME: &str = "nunu-cli";
pub const REPO_OWNER: &str = "nunu-ai";
pub const REPO_NAME: &str = "nunu-cli";

const LATEST: &str = "latest";
const VERSION_PREFIX: char = 'v';

/// Version requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionToken {
    Latest,
    Explicit(String),
}

impl From<&str> for VersionToken {
    fn from(value: &str) -> Self {
        if value == LATEST {
            Self::Latest
        } else {
            Self::Explicit(value.to_owned())
        }
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str(LATEST),
            Self::Explicit(v) => f.write_str(v),
        }
    }
}

/// A concrete version without its tag prefix, safe to use as a cache key
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedVersion(String);

impl ResolvedVersion {
    /// Strip one leading `v` from a tag or version string.
    pub fn from_tag(tag: &str) -> Result<Self, ActionError> {
        let version = tag.strip_prefix(VERSION_PREFIX).unwrap_or(tag);

        let unsafe_for_key = version.is_empty()
            || version == "."
            || version == ".."
            || version.starts_with(VERSION_PREFIX)
            || version
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control());

        if unsafe_for_key {
            return Err(ActionError::InvalidVersion(tag.to_owned()));
        }

        Ok(Self(version.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Release tag this version was published under.
    pub fn tag(&self) -> String {
        format!("{}{}", VERSION_PREFIX, self.0)
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the CLI is published and what it is called.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    pub tool_name: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub api_base: Url,
    pub download_base: Url,
    pub github_token: Option<String>,
}

impl InstallerConfig {
    pub fn from_args(args: &ActionArgs) -> Self {
        Self {
            tool_name: TOOL_NAME.to_owned(),
            repo_owner: REPO_OWNER.to_owned(),
            repo_name: REPO_NAME.to_owned(),
            api_base: args.api_url.clone(),
            download_base: args.download_url.clone(),
            github_token: args.github_token.clone().filter(|t| !t.is_empty()),
        }
    }

    #[cfg(test)]
    pub fn default_for_tests() -> Self {
        Self {
            tool_name: TOOL_NAME.to_owned(),
            repo_owner: REPO_OWNER.to_owned(),
            repo_name: REPO_NAME.to_owned(),
            api_base: Url::parse("https://api.github.com/").unwrap(),
            download_base: Url::parse("https://github.com/").unwrap(),
            github_token: None,
        }
    }
}

/// Resolves CLI versions and keeps downloaded binaries in the tool cache.
#[derive(Debug, Clone)]
pub struct Installer {
    config: InstallerConfig,
    api: ReleaseApi,
    cache: ToolCache,
    temp_root: PathBuf,
}

impl Installer {
    pub fn new(
        config: InstallerConfig,
        cache: ToolCache,
        temp_root: impl Into<PathBuf>,
    ) -> Result<Self, ActionError> {
        let api = ReleaseApi::new(&config)?;

        Ok(Self {
            config,
            api,
            cache,
            temp_root: temp_root.into(),
        })
    }

    /// Resolve `token` and return the path of a ready to run binary.
    #[tracing::instrument(skip(self))]
    pub async fn cli_path(
        &self,
        token: &VersionToken,
        platform: Platform,
        arch: Architecture,
    ) -> Result<PathBuf, ActionError> {
        tracing::info!("Setting up {} {}...", self.config.tool_name, token);

        let version = self.resolve_version(token).await?;
        self.fetch(&version, platform, arch).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve_version(
        &self,
        token: &VersionToken,
    ) -> Result<ResolvedVersion, ActionError> {
        match token {
            VersionToken::Explicit(v) => ResolvedVersion::from_tag(v),
            VersionToken::Latest => {
                let release = self.api.fetch_latest_release().await?;
                for asset in &release.assets {
                    tracing::debug!("Release asset {}: {}", asset.name, asset.browser_download_url);
                }

                let version = ResolvedVersion::from_tag(&release.tag_name)?;
                tracing::info!("Latest version: {}", version);

                Ok(version)
            }
        }
    }

    /// Return the cached binary for `version`, downloading it on a miss.
    #[tracing::instrument(skip(self), fields(version = version.as_str()))]
    pub async fn fetch(
        &self,
        version: &ResolvedVersion,
        platform: Platform,
        arch: Architecture,
    ) -> Result<PathBuf, ActionError> {
        let tool = &self.config.tool_name;
        let binary_name = platform.binary_name(tool);
        let key = self.cache_key(version, arch);

        if let Some(dir) = self.cache.find(&key).await {
            tracing::info!("✓ Found cached {} {}", tool, version);
            return Ok(dir.join(binary_name));
        }

        tracing::info!("Downloading {} {} for {}-{}...", tool, version, platform, arch);
        let url = self.download_url(version, platform, arch);
        tracing::debug!("Download URL: {}", url);

        tokio::fs::create_dir_all(&self.temp_root).await?;
        let download_dir = tempfile::Builder::new()
            .prefix(&format!("{}-", tool))
            .tempdir_in(&self.temp_root)?;
        let download_path = download_dir.path().join("download");

        self.api.download_to(&url, &download_path).await?;
        tracing::debug!("Downloaded to: {}", download_path.display());

        if !platform.is_windows() {
            make_executable(&download_path).await?;
        }

        let cached = self
            .cache
            .commit(&download_path, &binary_name, &key)
            .await?;

        tracing::info!("✓ Cached {} {}", tool, version);
        Ok(cached.join(binary_name))
    }

    pub fn cache_key(&self, version: &ResolvedVersion, arch: Architecture) -> CacheKey {
        CacheKey::new(&self.config.tool_name, version.as_str(), arch)
    }

    /// Release asset location for a version; depends on nothing but its
    /// arguments and the configuration.
    pub fn download_url(
        &self,
        version: &ResolvedVersion,
        platform: Platform,
        arch: Architecture,
    ) -> Url {
        let asset_name = format!(
            "{}-{}-{}{}",
            self.config.tool_name,
            platform.asset_name(),
            arch.as_str(),
            platform.executable_extension()
        );

        self.api.asset_url(&version.tag(), &asset_name)
    }
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), ActionError> {
    use std::os::unix::fs::PermissionsExt as _;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|source| ActionError::Permission {
            path: path.to_owned(),
            source,
        })?;

    tracing::debug!("Made executable: {}", path.display());
    Ok(())
}

#[cfg(not(unix))]
async fn make_executable(path: &Path) -> Result<(), ActionError> {
    tracing::debug!("No executable bit to set for {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        installer: Installer,
        cache_root: tempfile::TempDir,
        _temp_root: tempfile::TempDir,
    }

    fn fixture(server: &MockServer) -> Fixture {
        let base = Url::parse(&server.uri()).unwrap();
        let config = InstallerConfig {
            api_base: base.clone(),
            download_base: base,
            ..InstallerConfig::default_for_tests()
        };

        let cache_root = tempfile::tempdir().unwrap();
        let temp_root = tempfile::tempdir().unwrap();
        let installer = Installer::new(
            config,
            ToolCache::new(cache_root.path()),
            temp_root.path(),
        )
        .unwrap();

        Fixture {
            installer,
            cache_root,
            _temp_root: temp_root,
        }
    }

    fn offline_installer() -> Installer {
        Installer::new(
            InstallerConfig::default_for_tests(),
            ToolCache::new(std::env::temp_dir().join("nunu-unused-cache")),
            std::env::temp_dir(),
        )
        .unwrap()
    }

    fn version(v: &str) -> ResolvedVersion {
        ResolvedVersion::from_tag(v).unwrap()
    }

    #[test]
    fn strips_exactly_one_prefix() {
        assert_eq!(version("v2.3.1").as_str(), "2.3.1");
        assert_eq!(version("2.3.1").as_str(), "2.3.1");
        assert_eq!(version("v2.3.1").tag(), "v2.3.1");
    }

    #[test]
    fn stripping_is_idempotent() {
        for token in ["v1.0.0", "1.0.0", "v0.1.0-beta.1", "nightly-2024"] {
            let once = version(token);
            let twice = version(once.as_str());
            assert_eq!(once, twice, "token {token}");
        }
    }

    #[test]
    fn rejects_versions_unsafe_for_cache_keys() {
        for token in ["", "v", "vv1.0.0", "v..", "1.0/../../etc", "1.0 0"] {
            assert!(
                matches!(ResolvedVersion::from_tag(token), Err(ActionError::InvalidVersion(_))),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn parses_version_tokens() {
        assert_eq!(VersionToken::from("latest"), VersionToken::Latest);
        assert_eq!(
            VersionToken::from("v1.2.3"),
            VersionToken::Explicit("v1.2.3".to_owned())
        );
    }

    #[test]
    fn download_url_matches_release_layout() {
        let installer = offline_installer();

        let url = installer.download_url(&version("v2.3.1"), Platform::Linux, Architecture::X86_64);
        assert_eq!(
            url.as_str(),
            "https://github.com/nunu-ai/nunu-cli/releases/download/v2.3.1/nunu-cli-linux-x86_64"
        );

        let url = installer.download_url(&version("2.3.1"), Platform::MacOs, Architecture::Arm64);
        assert_eq!(
            url.as_str(),
            "https://github.com/nunu-ai/nunu-cli/releases/download/v2.3.1/nunu-cli-macos-arm64"
        );

        let url = installer.download_url(&version("2.3.1"), Platform::Windows, Architecture::X86_64);
        assert_eq!(
            url.as_str(),
            "https://github.com/nunu-ai/nunu-cli/releases/download/v2.3.1/nunu-cli-windows-x86_64.exe"
        );
    }

    #[test]
    fn download_url_is_deterministic() {
        let installer = offline_installer();
        let v = version("1.4.0");

        assert_eq!(
            installer.download_url(&v, Platform::Linux, Architecture::Arm64),
            installer.download_url(&v, Platform::Linux, Architecture::Arm64)
        );
    }

    #[tokio::test]
    async fn explicit_version_needs_no_network() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let resolved = fx
            .installer
            .resolve_version(&VersionToken::from("v2.3.1"))
            .await
            .unwrap();

        assert_eq!(resolved.as_str(), "2.3.1");
    }

    #[tokio::test]
    async fn latest_queries_release_index_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/nunu-ai/nunu-cli/releases/latest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "tag_name": "v3.0.0" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let resolved = fx
            .installer
            .resolve_version(&VersionToken::Latest)
            .await
            .unwrap();

        assert_eq!(resolved.as_str(), "3.0.0");
        assert_eq!(
            fx.installer.cache_key(&resolved, Architecture::X86_64),
            CacheKey::new("nunu-cli", "3.0.0", Architecture::X86_64)
        );
    }

    #[tokio::test]
    async fn failed_latest_lookup_aborts_before_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/nunu-ai/nunu-cli/releases/latest"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nunu-ai/nunu-cli/releases/download/v3.0.0/nunu-cli-linux-x86_64"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bin".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let err = fx
            .installer
            .cli_path(&VersionToken::Latest, Platform::Linux, Architecture::X86_64)
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::RemoteLookup(ref msg) if msg == "403"));
        assert_eq!(std::fs::read_dir(fx.cache_root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn cache_miss_downloads_once_then_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nunu-ai/nunu-cli/releases/download/v2.3.1/nunu-cli-linux-x86_64"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"#!/bin/sh\n".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let token = VersionToken::from("v2.3.1");

        let first = fx
            .installer
            .cli_path(&token, Platform::Linux, Architecture::X86_64)
            .await
            .unwrap();
        let second = fx
            .installer
            .cli_path(&token, Platform::Linux, Architecture::X86_64)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first,
            fx.cache_root
                .path()
                .join("nunu-cli")
                .join("2.3.1")
                .join("x86_64")
                .join("nunu-cli")
        );
        assert_eq!(std::fs::read(&first).unwrap(), b"#!/bin/sh\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let mode = std::fs::metadata(&first).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[tokio::test]
    async fn populated_cache_makes_no_network_calls() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let work = tempfile::tempdir().unwrap();
        let source = work.path().join("nunu-cli");
        std::fs::write(&source, b"cached").unwrap();

        let v = version("1.0.0");
        ToolCache::new(fx.cache_root.path())
            .commit(&source, "nunu-cli", &fx.installer.cache_key(&v, Architecture::Arm64))
            .await
            .unwrap();

        let path = fx
            .installer
            .fetch(&v, Platform::MacOs, Architecture::Arm64)
            .await
            .unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn windows_binary_keeps_exe_name_and_mode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nunu-ai/nunu-cli/releases/download/v2.0.0/nunu-cli-windows-x86_64.exe"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"MZ".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let path = fx
            .installer
            .fetch(&version("2.0.0"), Platform::Windows, Architecture::X86_64)
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "nunu-cli.exe");
        assert_eq!(std::fs::read(&path).unwrap(), b"MZ");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0);
        }
    }

    #[tokio::test]
    async fn missing_asset_is_a_download_error() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let err = fx
            .installer
            .fetch(&version("9.9.9"), Platform::Linux, Architecture::X86_64)
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::Download { .. }));
        assert!(fx
            .installer
            .cache
            .find(&CacheKey::new("nunu-cli", "9.9.9", Architecture::X86_64))
            .await
            .is_none());
    }
}
