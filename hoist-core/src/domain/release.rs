//! Release identifiers
//!
//! Every release directory under `<deploy_root>/releases/` is named by the
//! local wall-clock time it was created at, formatted `YYYYMMDDHHMMSS`. The
//! fixed width makes lexicographic order equal chronological order, which is
//! what retention relies on.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fixed-width timestamp naming one release directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseId(String);

impl ReleaseId {
    /// Number of characters in every identifier
    pub const WIDTH: usize = 14;

    /// `chrono` format producing identifiers
    pub const FORMAT: &'static str = "%Y%m%d%H%M%S";

    /// Identifier for a release created right now
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    /// Identifier for a release created at `at`
    pub fn from_datetime<Tz>(at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self(at.format(Self::FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ReleaseId {
    type Err = ReleaseIdError;

    /// Accepts exactly [`ReleaseId::WIDTH`] ASCII digits and nothing else
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.len() != Self::WIDTH {
            return Err(ReleaseIdError::Width {
                name: name.to_string(),
                width: name.len(),
            });
        }

        if !name.bytes().all(|b| b.is_ascii_digit()) || name.parse::<u64>().is_err() {
            return Err(ReleaseIdError::NotNumeric(name.to_string()));
        }

        Ok(Self(name.to_string()))
    }
}

impl TryFrom<String> for ReleaseId {
    type Error = ReleaseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReleaseId> for String {
    fn from(release: ReleaseId) -> Self {
        release.0
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a directory name is not a release identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReleaseIdError {
    #[error("release name '{name}' is {width} characters wide, expected {}", ReleaseId::WIDTH)]
    Width { name: String, width: usize },

    #[error("release name '{0}' is not numeric")]
    NotNumeric(String),
}
