//! Target domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// One remote machine a deploy connects to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    pub user: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, user: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port,
        }
    }

    /// `user@host`, the form ssh and rsync expect as a destination
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Stable connection identity `user@host:port`
    ///
    /// Used as the key (and file name) of the multiplexed connection.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.destination(), self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}
