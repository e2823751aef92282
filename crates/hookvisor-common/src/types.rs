//! Core domain types used throughout hookvisor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which standard stream of the managed child a pipe or sink belongs to.
///
/// # Example
/// ```
/// use hookvisor_common::StreamType;
///
/// assert_eq!(StreamType::Stderr.to_string(), "stderr");
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Stdout,
    Stderr,
}

impl StreamType {
    /// Returns the stream name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Stdout => "stdout",
            StreamType::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
