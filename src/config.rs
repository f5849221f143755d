use crate::auth::{AuthMethod, AuthSpec};
use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "GIT_MIRROR_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Settings threaded explicitly into the runner and executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Print job progress and stream transfer progress to stdout.
    pub verbose: bool,
    /// Treat any failed job as a failed run.
    pub fail_on_error: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub mirrors: Vec<RawMirror>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMirror {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub target: RawRepository,
    #[serde(default)]
    pub source: RawRepository,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRepository {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub auth: RawAuth,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAuth {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ssh_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    /// Repository that is cloned.
    Target,
    /// Repository that receives the mirror push.
    Source,
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRole::Target => f.write_str("target"),
            EndpointRole::Source => f.write_str("source"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub auth: AuthSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorJob {
    /// 1-based position in the config file.
    pub index: usize,
    pub name: String,
    pub target: Endpoint,
    pub source: Endpoint,
}

impl MirrorJob {
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("mirror {}", self.index)
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    mirrors: Vec<MirrorJob>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        if raw.mirrors.is_empty() {
            return Err(ConfigError::Validation(
                "no mirror configurations found".to_string(),
            ));
        }

        let mirrors = raw
            .mirrors
            .into_iter()
            .enumerate()
            .map(|(i, mirror)| validate_mirror(i + 1, mirror))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { mirrors })
    }

    pub fn mirrors(&self) -> &[MirrorJob] {
        &self.mirrors
    }
}

fn validate_mirror(index: usize, mirror: RawMirror) -> Result<MirrorJob, ConfigError> {
    if mirror.target.url.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "mirror {index}: target URL is required"
        )));
    }
    if mirror.source.url.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "mirror {index}: source URL is required"
        )));
    }

    let target_auth = validate_auth(&mirror.target.auth, index, EndpointRole::Target)?;
    let source_auth = validate_auth(&mirror.source.auth, index, EndpointRole::Source)?;

    Ok(MirrorJob {
        index,
        name: mirror.name,
        target: Endpoint {
            url: mirror.target.url,
            auth: target_auth,
        },
        source: Endpoint {
            url: mirror.source.url,
            auth: source_auth,
        },
    })
}

fn validate_auth(auth: &RawAuth, index: usize, role: EndpointRole) -> Result<AuthSpec, ConfigError> {
    let context = format!("mirror {index} {role}");
    let method: AuthMethod = auth
        .method
        .parse()
        .map_err(|e| ConfigError::Validation(format!("{context}: {e}")))?;

    match method {
        AuthMethod::None => Ok(AuthSpec::None),
        AuthMethod::Token => {
            if auth.token.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{context}: token is required when using token auth"
                )));
            }
            Ok(AuthSpec::Token {
                token: auth.token.clone(),
            })
        }
        AuthMethod::Basic => {
            if auth.username.is_empty() || auth.password.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{context}: username and password are required when using basic auth"
                )));
            }
            Ok(AuthSpec::Basic {
                username: auth.username.clone(),
                password: auth.password.clone(),
            })
        }
        AuthMethod::Ssh => {
            if auth.ssh_key.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{context}: ssh_key is required when using ssh auth"
                )));
            }
            Ok(AuthSpec::Ssh {
                key: PathBuf::from(&auth.ssh_key),
            })
        }
    }
}
