use crate::config::EndpointRole;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid or unreadable configuration. Fatal for the whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("config validation failed: {0}")]
    Validation(String),
}

/// Turning one endpoint's auth settings into a transport credential failed.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to get home directory for ssh key '{key}'")]
    HomeDirUnavailable { key: String },

    #[error("failed to load SSH key {}: {source}", path.display())]
    KeyRead { path: PathBuf, source: io::Error },

    #[error("failed to load SSH key {}: {reason}", path.display())]
    InvalidKey { path: PathBuf, reason: String },

    #[error("unsupported auth method '{0}'")]
    UnsupportedMethod(String),
}

/// Failure reported by the git transport (clone, remote setup or push).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Git(#[from] git2::Error),

    #[error("remote rejected {}", describe_rejections(.refs))]
    Rejected { refs: Vec<(String, String)> },

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

fn describe_rejections(refs: &[(String, String)]) -> String {
    refs.iter()
        .map(|(name, reason)| format!("{name} ({reason})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pipeline stage a mirror job failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Auth,
    Clone,
    Remote,
    Push,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Auth => "auth",
            Stage::Clone => "clone",
            Stage::Remote => "remote",
            Stage::Push => "push",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single mirror job, always tagged with the step that broke.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("failed to setup {role} auth: {source}")]
    AuthSetup {
        role: EndpointRole,
        source: CredentialError,
    },

    #[error("failed to clone target repository {url}: {source}")]
    Clone { url: String, source: TransportError },

    #[error("failed to create {remote} remote {url}: {source}")]
    RemoteSetup {
        remote: String,
        url: String,
        source: TransportError,
    },

    #[error("failed to push to source repository {url}: {source}")]
    Push { url: String, source: TransportError },
}

impl MirrorError {
    pub fn stage(&self) -> Stage {
        match self {
            MirrorError::AuthSetup { .. } => Stage::Auth,
            MirrorError::Clone { .. } => Stage::Clone,
            MirrorError::RemoteSetup { .. } => Stage::Remote,
            MirrorError::Push { .. } => Stage::Push,
        }
    }
}

#[derive(Debug, Error)]
pub enum GitMirrorError {
    #[error("Config Error: {0}")]
    Config(#[from] ConfigError),

    #[error("{failed} of {total} mirror jobs failed")]
    JobsFailed { failed: usize, total: usize },
}

impl GitMirrorError {
    pub fn display_localized(&self) -> String {
        match self {
            GitMirrorError::Config(err) => {
                t!("errors.config_error", message = err.to_string()).to_string()
            }
            GitMirrorError::JobsFailed { failed, total } => t!(
                "errors.jobs_failed",
                failed = failed.to_string(),
                total = total.to_string()
            )
            .to_string(),
        }
    }
}
