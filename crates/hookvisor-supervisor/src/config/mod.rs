use anyhow::{anyhow, Context, Result};
use hookvisor_trigger::{Verifier, WebhookSecret};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::managed::ProcessSpec;

pub mod validation;

/// Everything the supervisor needs, immutable once loaded.
///
/// Loaded from an optional YAML file and then overridden field by field from
/// the command line. Fields missing from the file fall back to the defaults
/// below; `command` and `secret` have no default and must come from one of
/// the two sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Listen address, `host:port`.
    pub address: String,
    pub command: String,
    pub params: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    /// Grace period between SIGTERM and SIGKILL. Also bounds the HTTP drain
    /// on shutdown.
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
    pub secret: SecretString,
    pub event: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub stdout_file: PathBuf,
    pub stderr_file: PathBuf,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            command: String::new(),
            params: Vec::new(),
            working_directory: None,
            shutdown_timeout: default_shutdown_timeout(),
            secret: SecretString::default(),
            event: default_event(),
            git_ref: default_ref(),
            stdout_file: PathBuf::from("command.out"),
            stderr_file: PathBuf::from("command.err"),
        }
    }
}

/// Command-line values layered over the file. `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub address: Option<String>,
    pub command: Option<String>,
    /// Replaces the file's list when non-empty.
    pub params: Vec<String>,
    pub shutdown_timeout: Option<Duration>,
    pub secret: Option<SecretString>,
    pub event: Option<String>,
    pub git_ref: Option<String>,
    pub stdout_file: Option<PathBuf>,
    pub stderr_file: Option<PathBuf>,
}

impl SupervisorConfig {
    /// Load and validate configuration from a YAML string.
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a possibly partial file, leaving validation to the caller.
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))
    }

    fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")
    }

    /// Resolve the final configuration: optional file first, then overrides,
    /// then validation.
    pub fn resolve(file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(address) = overrides.address {
            self.address = address;
        }
        if let Some(command) = overrides.command {
            self.command = command;
        }
        if !overrides.params.is_empty() {
            self.params = overrides.params;
        }
        if let Some(timeout) = overrides.shutdown_timeout {
            self.shutdown_timeout = timeout;
        }
        if let Some(secret) = overrides.secret {
            self.secret = secret;
        }
        if let Some(event) = overrides.event {
            self.event = event;
        }
        if let Some(git_ref) = overrides.git_ref {
            self.git_ref = git_ref;
        }
        if let Some(path) = overrides.stdout_file {
            self.stdout_file = path;
        }
        if let Some(path) = overrides.stderr_file {
            self.stderr_file = path;
        }
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Build the webhook verifier from the configured secret and filters.
    pub fn verifier(&self) -> Result<Verifier> {
        let secret = WebhookSecret::new(self.secret.expose())
            .map_err(|e| anyhow!("Invalid webhook secret: {e}"))?;
        Ok(Verifier::new(secret, &self.event, &self.git_ref))
    }

    pub fn process_spec(&self) -> ProcessSpec {
        ProcessSpec {
            command: self.command.clone(),
            args: self.params.clone(),
            working_directory: self.working_directory.clone(),
            stdout_path: self.stdout_file.clone(),
            stderr_path: self.stderr_file.clone(),
        }
    }
}

/// A string that never shows up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SecretString(<unset>)")
        } else {
            f.write_str("SecretString(<redacted>)")
        }
    }
}

impl From<String> for SecretString {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

fn default_address() -> String {
    "localhost:8000".to_string()
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_event() -> String {
    "push".to_string()
}

fn default_ref() -> String {
    "refs/heads/main".to_string()
}

/// Parse `200ms`, `5s` or `1m`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // "ms" before "s", since "ms" ends with 's'
    if let Some(num_str) = s.strip_suffix("ms") {
        let millis: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
        Ok(Duration::from_millis(millis))
    } else if let Some(num_str) = s.strip_suffix('s') {
        let secs: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
        Ok(Duration::from_secs(secs))
    } else if let Some(num_str) = s.strip_suffix('m') {
        let mins: u64 = num_str.parse().map_err(|_| format!("Invalid duration: {}", s))?;
        mins.checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("Duration too large: {}", s))
    } else {
        Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
