//! # Consistency Protocol Selection
//!
//! Exactly one [`ConsistencyMode`] is chosen per run. Numeric codes follow
//! the simulation's command line: `0` none, `1` push, `2` pull-validate,
//! `3` push + pull-validate, `4` version-authority, `5` push +
//! version-authority.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Cache-consistency algorithm active for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConsistencyMode {
    /// Copies are never revalidated.
    None,
    /// Owner floods invalidations on every update.
    #[default]
    Push,
    /// Holders ask the owner before serving a cached copy.
    PullValidate,
    /// Push and pull-validate together.
    PushPullValidate,
    /// Super-peers track per-holder versions and arbitrate staleness.
    VersionAuthority,
    /// Push invalidations that also feed the version-authority table.
    PushVersionAuthority,
}

/// Unparseable mode string or code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown consistency mode: {0}")]
pub struct UnknownMode(pub String);

impl ConsistencyMode {
    /// Owner floods `invalidate` on each local update.
    pub fn pushes_invalidations(self) -> bool {
        matches!(
            self,
            Self::Push | Self::PushPullValidate | Self::PushVersionAuthority
        )
    }

    /// Holders call `upToDate` on the master before serving a cached copy.
    pub fn validates_on_obtain(self) -> bool {
        matches!(self, Self::PullValidate | Self::PushPullValidate)
    }

    /// Supers keep the per-holder version table and answer `checkVersion`.
    pub fn tracks_versions(self) -> bool {
        matches!(self, Self::VersionAuthority | Self::PushVersionAuthority)
    }

    /// Numeric code used on the command line.
    pub fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Push => 1,
            Self::PullValidate => 2,
            Self::PushPullValidate => 3,
            Self::VersionAuthority => 4,
            Self::PushVersionAuthority => 5,
        }
    }
}

impl TryFrom<u8> for ConsistencyMode {
    type Error = UnknownMode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::Push),
            2 => Ok(Self::PullValidate),
            3 => Ok(Self::PushPullValidate),
            4 => Ok(Self::VersionAuthority),
            5 => Ok(Self::PushVersionAuthority),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

impl FromStr for ConsistencyMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::try_from(code);
        }
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "push" => Ok(Self::Push),
            "pull" | "pull-validate" => Ok(Self::PullValidate),
            "push-pull" | "push-pull-validate" => Ok(Self::PushPullValidate),
            "pull2" | "version-authority" => Ok(Self::VersionAuthority),
            "push-version-authority" => Ok(Self::PushVersionAuthority),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for ConsistencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Push => "push",
            Self::PullValidate => "pull-validate",
            Self::PushPullValidate => "push-pull-validate",
            Self::VersionAuthority => "version-authority",
            Self::PushVersionAuthority => "push-version-authority",
        };
        f.write_str(name)
    }
}
