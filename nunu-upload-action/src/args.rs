use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;

/// Raw action inputs.
///
/// The runner passes every `with:` input as `INPUT_<NAME>`; unset optional
/// inputs arrive as empty strings, which [`crate::inputs::ActionInputs`]
/// treats as absent.
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Upload a build to nunu with nunu-cli")]
pub struct ActionArgs {
    #[arg(long, env = "INPUT_API-TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    #[arg(long, env = "INPUT_PROJECT-ID")]
    pub project_id: Option<String>,

    #[arg(long, env = "INPUT_FILE")]
    pub file: Option<String>,

    #[arg(long, env = "INPUT_NAME")]
    pub name: Option<String>,

    #[arg(long, env = "INPUT_PLATFORM")]
    pub platform: Option<String>,

    #[arg(long, env = "INPUT_DESCRIPTION")]
    pub description: Option<String>,

    #[arg(long, env = "INPUT_AUTO-DELETE")]
    pub auto_delete: Option<String>,

    #[arg(long, env = "INPUT_DELETION-POLICY")]
    pub deletion_policy: Option<String>,

    #[arg(long, env = "INPUT_UPLOAD-TIMEOUT")]
    pub upload_timeout: Option<String>,

    #[arg(long, env = "INPUT_CLI-VERSION")]
    pub cli_version: Option<String>,

    /// Token for the release index, raises the API rate limit.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    #[arg(long, env = "RUNNER_TOOL_CACHE")]
    pub tool_cache: Option<PathBuf>,

    #[arg(long, env = "RUNNER_TEMP")]
    pub temp_dir: Option<PathBuf>,

    #[arg(long, hide = true, default_value = "https://api.github.com/", env = "NUNU_CLI_API_URL")]
    pub api_url: Url,

    #[arg(long, hide = true, default_value = "https://github.com/", env = "NUNU_CLI_DOWNLOAD_URL")]
    pub download_url: Url,
}
