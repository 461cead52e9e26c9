//! Host platform detection and normalisation
//!
//! Release artifacts are published per operating system and CPU architecture. This
//! module turns whatever the host reports into a canonical [`PlatformKey`] that is used
//! as the lookup key into the update manifest and as a path component of download URLs.
//!
//! | Reported OS                | Canonical |
//! |----------------------------|-----------|
//! | `linux`                    | `linux`   |
//! | `darwin`, `macos`          | `darwin`  |
//! | `windows`, `windows nt`    | `windows` |
//!
//! | Reported arch                    | Canonical |
//! |----------------------------------|-----------|
//! | `arm`, `arm64`, `aarch64`        | `arm64`   |
//! | `x64`, `x86_64`, `amd64`         | `x64`     |
//!
//! Matching is case-insensitive. Anything else is a
//! [`PlatformDetection`](crate::core::OsmfluxError::PlatformDetection) error: a wrong
//! guess here means downloading a binary that cannot run, so nothing is defaulted.
//!
//! # Examples
//!
//! ```rust,no_run
//! use osmflux::utils::platform::{PlatformKey, resolve};
//!
//! # fn example() -> Result<(), osmflux::core::OsmfluxError> {
//! let key = PlatformKey::from_reported("Windows", "ARM")?;
//! assert_eq!(key.to_string(), "windows/arm64");
//!
//! let host = resolve()?;
//! println!("running on {host}");
//! # Ok(())
//! # }
//! ```

use crate::core::OsmfluxError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Canonical operating system identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Darwin,
    Windows,
}

impl Os {
    /// Parse a host-reported OS name.
    pub fn parse(reported: &str) -> Result<Self, OsmfluxError> {
        match reported.trim().to_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "darwin" | "macos" => Ok(Self::Darwin),
            "windows" | "windows nt" => Ok(Self::Windows),
            "" => Err(OsmfluxError::PlatformDetection {
                reason: "host did not report an operating system".to_string(),
            }),
            other => Err(OsmfluxError::PlatformDetection {
                reason: format!("unsupported operating system '{other}'"),
            }),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical CPU architecture bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X64,
    Arm64,
}

impl Arch {
    /// Parse a host-reported architecture name.
    pub fn parse(reported: &str) -> Result<Self, OsmfluxError> {
        match reported.trim().to_lowercase().as_str() {
            "arm" | "arm64" | "aarch64" => Ok(Self::Arm64),
            "x64" | "x86_64" | "amd64" => Ok(Self::X64),
            "" => Err(OsmfluxError::PlatformDetection {
                reason: "host did not report a CPU architecture".to_string(),
            }),
            other => Err(OsmfluxError::PlatformDetection {
                reason: format!("unsupported CPU architecture '{other}'"),
            }),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(os, arch)` pair selecting which binary variant to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformKey {
    pub os: Os,
    pub arch: Arch,
}

impl PlatformKey {
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self {
            os,
            arch,
        }
    }

    /// Normalise what a host reported into a key.
    pub fn from_reported(os: &str, arch: &str) -> Result<Self, OsmfluxError> {
        Ok(Self {
            os: Os::parse(os)?,
            arch: Arch::parse(arch)?,
        })
    }

    #[must_use]
    pub const fn is_windows(&self) -> bool {
        matches!(self.os, Os::Windows)
    }

    /// File name of a command on this platform (`.exe` suffix on windows).
    #[must_use]
    pub fn executable_name(&self, command: &str) -> String {
        if self.is_windows() {
            format!("{command}.exe")
        } else {
            command.to_string()
        }
    }

    /// Inverse of [`executable_name`](Self::executable_name).
    #[must_use]
    pub fn command_name<'a>(&self, file_name: &'a str) -> &'a str {
        if self.is_windows() {
            file_name.strip_suffix(".exe").unwrap_or(file_name)
        } else {
            file_name
        }
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

static HOST_PLATFORM: OnceLock<PlatformKey> = OnceLock::new();

/// Resolve the platform of the running process.
///
/// The first successful call queries the host; later calls return the cached key.
/// Failures are not cached.
pub fn resolve() -> Result<PlatformKey, OsmfluxError> {
    if let Some(key) = HOST_PLATFORM.get() {
        return Ok(*key);
    }

    let key = PlatformKey::from_reported(std::env::consts::OS, std::env::consts::ARCH)?;
    Ok(*HOST_PLATFORM.get_or_init(|| key))
}

#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        let platform_help = if is_windows() {
            "On Windows: Check that the USERPROFILE environment variable is set"
        } else {
            "On Unix/Linux: Check that the HOME environment variable is set"
        };
        anyhow::anyhow!("Could not determine home directory.\n\n{platform_help}")
    })
}
