mod api;
mod args;
mod cache;
mod error;
mod inputs;
mod installer;
mod platform;
mod upload;
mod workflow;

use clap::Parser as _;
use std::error::Error as _;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use crate::args::ActionArgs;
use crate::cache::ToolCache;
use crate::error::ActionError;
use crate::inputs::ActionInputs;
use crate::installer::{Installer, InstallerConfig, VersionToken};
use crate::platform::{Architecture, Platform};

fn main() {
    let indicatif_layer = tracing_indicatif::IndicatifLayer::new();

    let default_level = if std::env::var("RUNNER_DEBUG").is_ok_and(|v| v == "1") {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .with_env_var("NUNU_UPLOAD_LOG")
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .init();

    let args = ActionArgs::parse();

    let result = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build() {
        Ok(v) => v.block_on(async_main(args)),
        Err(err) => Err(ActionError::from(err)),
    };

    if let Err(err) = result {
        tracing::error!("Error: {}", err);

        let mut src = err.source();
        while let Some(err) = src {
            tracing::error!("-> Caused by: {}", err);
            src = err.source();
        }

        workflow::report_failure(&err.to_string());
        std::process::exit(1);
    }
}

async fn async_main(args: ActionArgs) -> Result<(), ActionError> {
    let inputs = ActionInputs::try_from(&args)?;
    tracing::trace!("inputs = {:#?}", inputs);

    let runner_os = std::env::var("RUNNER_OS").ok();
    let runner_arch = std::env::var("RUNNER_ARCH").ok();

    let cli_path = install_cli(
        &args,
        &inputs.cli_version,
        runner_os.as_deref(),
        runner_arch.as_deref(),
    )
    .await?;
    tracing::info!("Using nunu-cli at: {}", cli_path.display());

    let upload_args = upload::build_args(&inputs);

    tracing::info!("Starting upload...");
    tracing::info!("File: {}", inputs.file);
    if let Some(name) = &inputs.name {
        tracing::info!("Name: {}", name);
    }

    let output = upload::run_upload(&cli_path, &upload_args).await?;

    if let Some(build_id) = upload::parse_build_id(&output) {
        workflow::set_output("build-id", build_id)?;
        tracing::info!("✓ Build ID: {}", build_id);
    }

    tracing::info!("✅ Upload completed successfully!");

    Ok(())
}

/// Resolve and fetch the CLI for the runner described by `runner_os` and
/// `runner_arch`.
async fn install_cli(
    args: &ActionArgs,
    version: &VersionToken,
    runner_os: Option<&str>,
    runner_arch: Option<&str>,
) -> Result<PathBuf, ActionError> {
    // Must fail before anything touches the network or the cache.
    let platform = Platform::from_runner(runner_os)?;
    let arch = Architecture::from_runner(runner_arch)?;

    let cache = ToolCache::new(args.tool_cache.clone().unwrap_or_else(ToolCache::default_root));
    tracing::debug!("Using tool cache at {}", cache.root().display());

    let installer = Installer::new(
        InstallerConfig::from_args(args),
        cache,
        args.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
    )?;

    installer.cli_path(version, platform, arch).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::MockServer;

    fn args_for(server: &MockServer, root: &std::path::Path) -> ActionArgs {
        let root = root.to_string_lossy();
        ActionArgs::parse_from([
            "nunu-upload-action".to_owned(),
            "--tool-cache".to_owned(),
            format!("{}/cache", root),
            "--temp-dir".to_owned(),
            format!("{}/tmp", root),
            "--api-url".to_owned(),
            server.uri(),
            "--download-url".to_owned(),
            server.uri(),
        ])
    }

    #[tokio::test]
    async fn unsupported_architecture_fails_before_any_io() {
        let server = MockServer::start().await;
        let root = tempfile::tempdir().unwrap();
        let args = args_for(&server, root.path());

        let err = install_cli(&args, &VersionToken::Latest, Some("Linux"), Some("mips"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ActionError::UnsupportedPlatform { kind: "architecture", .. }
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(!root.path().join("cache").exists());
        assert!(!root.path().join("tmp").exists());
    }

    #[tokio::test]
    async fn unsupported_platform_fails_before_any_io() {
        let server = MockServer::start().await;
        let root = tempfile::tempdir().unwrap();
        let args = args_for(&server, root.path());

        let err = install_cli(&args, &VersionToken::Latest, Some("FreeBSD"), Some("X64"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ActionError::UnsupportedPlatform { kind: "platform", .. }
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(!root.path().join("cache").exists());
    }
}
