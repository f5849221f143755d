//! Credential resolution.
//!
//! Turns the validated auth settings of one endpoint into a transport
//! credential. Resolution runs fresh for every endpoint of every job; nothing
//! is cached between jobs.

use crate::error::CredentialError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Username sent alongside a personal access token over HTTPS.
pub const TOKEN_USERNAME: &str = "token";
/// Default SSH user when the URL does not name one.
pub const SSH_USERNAME: &str = "git";
pub const SSH_DIR: &str = ".ssh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    None,
    Token,
    Basic,
    Ssh,
}

impl AuthMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::Token => "token",
            AuthMethod::Basic => "basic",
            AuthMethod::Ssh => "ssh",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(AuthMethod::None),
            "token" => Ok(AuthMethod::Token),
            "basic" => Ok(AuthMethod::Basic),
            "ssh" => Ok(AuthMethod::Ssh),
            other => Err(CredentialError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated auth settings for one endpoint.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthSpec {
    None,
    Token { token: String },
    Basic { username: String, password: String },
    /// Key path as configured; relative paths live under `~/.ssh`.
    Ssh { key: PathBuf },
}

impl AuthSpec {
    pub fn method(&self) -> AuthMethod {
        match self {
            AuthSpec::None => AuthMethod::None,
            AuthSpec::Token { .. } => AuthMethod::Token,
            AuthSpec::Basic { .. } => AuthMethod::Basic,
            AuthSpec::Ssh { .. } => AuthMethod::Ssh,
        }
    }
}

impl fmt::Debug for AuthSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthSpec::None => f.write_str("None"),
            AuthSpec::Token { .. } => f.debug_struct("Token").field("token", &"***").finish(),
            AuthSpec::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            AuthSpec::Ssh { key } => f.debug_struct("Ssh").field("key", key).finish(),
        }
    }
}

/// Transport-ready secret for a single network operation.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Anonymous,
    UserPass { username: String, password: String },
    SshKey { username: String, path: PathBuf },
}

impl Credential {
    pub fn username(&self) -> Option<&str> {
        match self {
            Credential::Anonymous => None,
            Credential::UserPass { username, .. } | Credential::SshKey { username, .. } => {
                Some(username)
            }
        }
    }

    pub fn password(&self) -> Option<&str> {
        match self {
            Credential::UserPass { password, .. } => Some(password),
            _ => None,
        }
    }

    pub fn key_path(&self) -> Option<&Path> {
        match self {
            Credential::SshKey { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Anonymous => f.write_str("Anonymous"),
            Credential::UserPass { username, .. } => f
                .debug_struct("UserPass")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credential::SshKey { username, path } => f
                .debug_struct("SshKey")
                .field("username", username)
                .field("path", path)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialResolver {
    home_dir: Option<PathBuf>,
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialResolver {
    pub fn new() -> Self {
        Self {
            home_dir: dirs::home_dir(),
        }
    }

    pub fn with_home_dir(home_dir: Option<PathBuf>) -> Self {
        Self { home_dir }
    }

    pub fn resolve(&self, spec: &AuthSpec) -> Result<Credential, CredentialError> {
        match spec {
            AuthSpec::None => {
                println!("{}", t!("auth.skipping"));
                Ok(Credential::Anonymous)
            }
            AuthSpec::Token { token } => Ok(Credential::UserPass {
                username: TOKEN_USERNAME.to_string(),
                password: token.clone(),
            }),
            AuthSpec::Basic { username, password } => Ok(Credential::UserPass {
                username: username.clone(),
                password: password.clone(),
            }),
            AuthSpec::Ssh { key } => {
                let path = self.ssh_key_path(key)?;
                load_private_key(&path)?;
                debug!(path = %path.display(), "loaded ssh key");
                Ok(Credential::SshKey {
                    username: SSH_USERNAME.to_string(),
                    path,
                })
            }
        }
    }

    /// Absolute location of an SSH key reference.
    pub fn ssh_key_path(&self, key: &Path) -> Result<PathBuf, CredentialError> {
        if key.is_absolute() {
            return Ok(key.to_path_buf());
        }
        let home = self
            .home_dir
            .as_ref()
            .ok_or_else(|| CredentialError::HomeDirUnavailable {
                key: key.display().to_string(),
            })?;
        Ok(home.join(SSH_DIR).join(key))
    }
}

fn load_private_key(path: &Path) -> Result<(), CredentialError> {
    let content = fs::read_to_string(path).map_err(|source| CredentialError::KeyRead {
        path: path.to_path_buf(),
        source,
    })?;
    // Keys are used without a passphrase, so an encrypted key is as unusable
    // as a corrupt one.
    russh_keys::decode_secret_key(&content, None).map_err(|err| {
        CredentialError::InvalidKey {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    })?;
    Ok(())
}
