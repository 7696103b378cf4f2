use crate::error::ActionError;
use std::fmt;
use std::str::FromStr;

/// Operating system the downloaded binary has to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// Platform named by the runner's `RUNNER_OS`, falling back to the
    /// compile target.
    pub fn from_runner(runner_os: Option<&str>) -> Result<Self, ActionError> {
        match runner_os {
            Some(v) if !v.is_empty() => v.parse(),
            _ => std::env::consts::OS.parse(),
        }
    }

    /// Name used in release asset file names.
    pub fn asset_name(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
        }
    }

    /// Extension executables carry on this platform.
    pub fn executable_extension(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Linux | Self::MacOs => "",
        }
    }

    /// File name of the installed binary for a tool.
    pub fn binary_name(self, tool: &str) -> String {
        format!("{}{}", tool, self.executable_extension())
    }

    pub fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }
}

impl FromStr for Platform {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" => Ok(Self::MacOs),
            "windows" | "win32" => Ok(Self::Windows),
            _ => Err(ActionError::UnsupportedPlatform {
                kind: "platform",
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.asset_name())
    }
}

/// CPU architecture the downloaded binary has to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86_64,
    Arm64,
}

impl Architecture {
    /// Architecture named by the runner's `RUNNER_ARCH`, preferred over the
    /// compile target.
    pub fn from_runner(runner_arch: Option<&str>) -> Result<Self, ActionError> {
        match runner_arch {
            Some(v) if !v.is_empty() => v.parse(),
            _ => std::env::consts::ARCH.parse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
        }
    }
}

impl FromStr for Architecture {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86_64" | "x64" | "amd64" => Ok(Self::X86_64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            _ => Err(ActionError::UnsupportedPlatform {
                kind: "architecture",
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
