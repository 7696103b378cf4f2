use crate::args::ActionArgs;
use crate::error::ActionError;
use crate::installer::VersionToken;
use std::fmt;
use std::str::FromStr;

const UPLOAD_TIMEOUT_RANGE: std::ops::RangeInclusive<u32> = 1..=1440;

/// Which builds the service deletes when `auto-delete` needs room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    LeastRecent,
    Oldest,
}

impl DeletionPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeastRecent => "least_recent",
            Self::Oldest => "oldest",
        }
    }
}

impl FromStr for DeletionPolicy {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "least_recent" => Ok(Self::LeastRecent),
            "oldest" => Ok(Self::Oldest),
            _ => Err(ActionError::InvalidInput {
                input: "deletion-policy",
                message: format!("{}. Must be \"least_recent\" or \"oldest\".", s),
            }),
        }
    }
}

impl fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated inputs of one action run.
#[derive(Clone, PartialEq, Eq)]
pub struct ActionInputs {
    pub api_token: String,
    pub project_id: String,
    pub file: String,
    pub name: Option<String>,
    pub platform: Option<String>,
    pub description: Option<String>,
    pub auto_delete: bool,
    pub deletion_policy: Option<DeletionPolicy>,
    pub upload_timeout: Option<u32>,
    pub cli_version: VersionToken,
}

// Keeps the api token out of logs.
impl fmt::Debug for ActionInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInputs")
            .field("api_token", &"***")
            .field("project_id", &self.project_id)
            .field("file", &self.file)
            .field("name", &self.name)
            .field("platform", &self.platform)
            .field("description", &self.description)
            .field("auto_delete", &self.auto_delete)
            .field("deletion_policy", &self.deletion_policy)
            .field("upload_timeout", &self.upload_timeout)
            .field("cli_version", &self.cli_version)
            .finish()
    }
}

impl TryFrom<&ActionArgs> for ActionInputs {
    type Error = ActionError;

    fn try_from(args: &ActionArgs) -> Result<Self, Self::Error> {
        let deletion_policy = optional(&args.deletion_policy)
            .map(str::parse::<DeletionPolicy>)
            .transpose()?;

        let upload_timeout = optional(&args.upload_timeout)
            .map(parse_upload_timeout)
            .transpose()?;

        Ok(Self {
            api_token: required(&args.api_token, "api-token")?,
            project_id: required(&args.project_id, "project-id")?,
            file: required(&args.file, "file")?,
            name: optional(&args.name).map(ToOwned::to_owned),
            platform: optional(&args.platform).map(ToOwned::to_owned),
            description: optional(&args.description).map(ToOwned::to_owned),
            auto_delete: optional(&args.auto_delete).is_some_and(|v| v.eq_ignore_ascii_case("true")),
            deletion_policy,
            upload_timeout,
            cli_version: optional(&args.cli_version)
                .map(VersionToken::from)
                .unwrap_or(VersionToken::Latest),
        })
    }
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required(value: &Option<String>, input: &'static str) -> Result<String, ActionError> {
    optional(value)
        .map(ToOwned::to_owned)
        .ok_or_else(|| ActionError::InvalidInput {
            input,
            message: "input required and not supplied".to_owned(),
        })
}

/// Reads the leading decimal digits, so `"60m"` is 60 and `"1.5"` is 1.
fn parse_upload_timeout(value: &str) -> Result<u32, ActionError> {
    let unsigned = value.strip_prefix('+').unwrap_or(value);
    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .map_or(unsigned, |end| &unsigned[..end]);

    digits
        .parse::<u32>()
        .ok()
        .filter(|minutes| UPLOAD_TIMEOUT_RANGE.contains(minutes))
        .ok_or_else(|| ActionError::InvalidInput {
            input: "upload-timeout",
            message: format!("{}. Must be between 1 and 1440.", value),
        })
}
