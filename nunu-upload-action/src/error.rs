use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("an I/O error occurred: {0}")]
    GenericIo(#[from] std::io::Error),

    #[error("http client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("unsupported {kind}: {value}")]
    UnsupportedPlatform { kind: &'static str, value: String },

    #[error("failed to fetch latest release: {0}")]
    RemoteLookup(String),

    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: TransferError,
    },

    #[error("failed to make {} executable: {source}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("invalid {input}: {message}")]
    InvalidInput { input: &'static str, message: String },

    #[error("upload failed with exit code {code}\n{stderr}")]
    UploadFailed { code: i32, stderr: String },
}

/// What broke while moving an asset from the server to disk.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Write(#[from] std::io::Error),
}
