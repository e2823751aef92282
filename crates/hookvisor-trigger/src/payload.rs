//! The subset of the GitHub push payload hookvisor reads.
//!
//! Only `ref` is required. The other fields are optional and used for log
//! context; unknown fields are ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Commit SHA the ref points to after the push.
    #[serde(default)]
    pub after: String,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub pusher: Option<Pusher>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pusher {
    #[serde(default)]
    pub name: String,
}

impl PushEvent {
    /// First seven characters of the pushed commit, for logs.
    pub fn short_commit(&self) -> &str {
        let end = self
            .after
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.after.len());
        &self.after[..end]
    }

    pub fn repository_name(&self) -> &str {
        self.repository
            .as_ref()
            .map(|r| r.full_name.as_str())
            .unwrap_or("")
    }

    pub fn pusher_name(&self) -> &str {
        self.pusher.as_ref().map(|p| p.name.as_str()).unwrap_or("")
    }
}
