use crate::error::ActionError;
use crate::inputs::ActionInputs;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::io::{AsyncBufReadExt as _, AsyncRead, BufReader};
use tokio::process::Command;

static BUILD_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Build ID: ([a-f0-9-]+)").expect("Invalid BUILD_ID_RE regex"));

/// Arguments for `nunu-cli upload`.
pub fn build_args(inputs: &ActionInputs) -> Vec<String> {
    let mut args = vec![
        "upload".to_owned(),
        inputs.file.clone(),
        "--token".to_owned(),
        inputs.api_token.clone(),
        "--project-id".to_owned(),
        inputs.project_id.clone(),
    ];

    if let Some(name) = &inputs.name {
        args.extend(["--name".to_owned(), name.clone()]);
    }

    if let Some(platform) = &inputs.platform {
        args.extend(["--platform".to_owned(), platform.clone()]);
    }

    if let Some(description) = &inputs.description {
        args.extend(["--description".to_owned(), description.clone()]);
    }

    if inputs.auto_delete {
        args.push("--auto-delete".to_owned());
    }

    if let Some(policy) = inputs.deletion_policy {
        args.extend(["--deletion-policy".to_owned(), policy.to_string()]);
    }

    if let Some(timeout) = inputs.upload_timeout {
        args.extend(["--upload-timeout".to_owned(), timeout.to_string()]);
    }

    args
}

/// Find the build id the CLI prints after a successful upload.
pub fn parse_build_id(output: &str) -> Option<&str> {
    BUILD_ID_RE
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Run the CLI, echoing its output to the log as it arrives, and return
/// what it wrote to stdout.
#[tracing::instrument(skip(args), fields(cli = %cli.display()))]
pub async fn run_upload(cli: &Path, args: &[String]) -> Result<String, ActionError> {
    let mut child = Command::new(cli)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr) = tokio::join!(
        drain(stdout, |line| tracing::info!("{}", line)),
        drain(stderr, |line| tracing::warn!("{}", line)),
    );
    let (stdout, stderr) = (stdout?, stderr?);

    let status = child.wait().await?;
    if !status.success() {
        return Err(ActionError::UploadFailed {
            code: status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(stdout)
}

async fn drain<R>(stream: Option<R>, echo: impl Fn(&str)) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut collected = String::new();
    let Some(stream) = stream else {
        return Ok(collected);
    };

    // Output is not guaranteed to be UTF-8.
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        echo(line);
        collected.push_str(line);
        collected.push('\n');
    }

    Ok(collected)
}
