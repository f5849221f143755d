use super::{GitTransport, MirrorRepository};
use crate::auth::{Credential, SSH_USERNAME};
use crate::error::TransportError;
use git2::{
    AutotagOption, Cred, CredentialType, Direction, FetchOptions, PushOptions, ReferenceType,
    Remote, RemoteCallbacks, Repository,
};
use std::io::{self, Write};
use tempfile::TempDir;
use tracing::{debug, instrument};

/// Fetch refspec that copies every ref verbatim, like `git clone --mirror`.
pub const MIRROR_REFSPEC: &str = "+refs/*:refs/*";

const ORIGIN_REMOTE: &str = "origin";
const SCRATCH_PREFIX: &str = "git-mirror-";
/// Where a remote's refs are parked while its ref list is read.
const REMOTE_REFS_NAMESPACE: &str = "refs/git-mirror/remote/";

/// libgit2-backed transport.
///
/// Mirror clones land in a bare scratch repository under the system temp
/// directory. It has no working tree and is removed as soon as the returned
/// [`Git2Repository`] is dropped.
#[derive(Debug, Clone, Default)]
pub struct Git2Transport {
    verbose: bool,
}

impl Git2Transport {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl GitTransport for Git2Transport {
    type Repository = Git2Repository;

    #[instrument(skip(self, credential))]
    fn clone_mirror(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<Git2Repository, TransportError> {
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()?;
        let repo = Repository::init_bare(scratch.path())?;

        {
            let mut remote = repo.remote_with_fetch(ORIGIN_REMOTE, url, MIRROR_REFSPEC)?;
            let mut callbacks = RemoteCallbacks::new();
            callbacks.credentials(credentials_callback(credential));
            if self.verbose {
                callbacks.transfer_progress(|stats| {
                    print_progress(&format!(
                        "Receiving objects: {}/{} ({} bytes), resolving deltas: {}/{}",
                        stats.received_objects(),
                        stats.total_objects(),
                        stats.received_bytes(),
                        stats.indexed_deltas(),
                        stats.total_deltas()
                    ));
                    true
                });
                callbacks.sideband_progress(print_sideband);
            }

            let mut options = FetchOptions::new();
            options.remote_callbacks(callbacks);
            options.download_tags(AutotagOption::All);
            remote.fetch(&[MIRROR_REFSPEC], Some(&mut options), None)?;
        }
        if self.verbose {
            println!();
        }

        debug!(refs = local_refs(&repo)?.len(), "mirror clone complete");
        Ok(Git2Repository {
            repo,
            verbose: self.verbose,
            _scratch: scratch,
        })
    }
}

/// Bare mirror clone owned by one job. Field order matters: the repository
/// handle must close before its scratch directory is removed.
pub struct Git2Repository {
    repo: Repository,
    verbose: bool,
    _scratch: TempDir,
}

impl Git2Repository {
    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}

impl MirrorRepository for Git2Repository {
    fn add_remote(&mut self, name: &str, url: &str) -> Result<(), TransportError> {
        self.repo.remote(name, url)?;
        Ok(())
    }

    #[instrument(skip(self, credential))]
    fn push_mirror(
        &mut self,
        remote: &str,
        credential: &Credential,
    ) -> Result<(), TransportError> {
        let local = local_refs(&self.repo)?;
        let mut remote = self.repo.find_remote(remote)?;

        let advertised = self.remote_refs(&mut remote, credential)?;

        let refspecs = mirror_refspecs(&local, &advertised);
        if refspecs.is_empty() {
            debug!("nothing to push");
            return Ok(());
        }
        debug!(count = refspecs.len(), "pushing mirror refspecs");

        let mut rejected = Vec::new();
        {
            let mut callbacks = RemoteCallbacks::new();
            callbacks.credentials(credentials_callback(credential));
            callbacks.push_update_reference(|refname, status| {
                if let Some(reason) = status {
                    rejected.push((refname.to_string(), reason.to_string()));
                }
                Ok(())
            });
            if self.verbose {
                callbacks.push_transfer_progress(|current, total, bytes| {
                    print_progress(&format!(
                        "Writing objects: {current}/{total} ({bytes} bytes)"
                    ));
                });
                callbacks.sideband_progress(print_sideband);
            }

            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote.push(&refspecs, Some(&mut options))?;
        }
        if self.verbose {
            println!();
        }

        if !rejected.is_empty() {
            return Err(TransportError::Rejected { refs: rejected });
        }
        Ok(())
    }
}

impl Git2Repository {
    /// Names of the refs the remote currently holds.
    fn remote_refs(
        &self,
        remote: &mut Remote<'_>,
        credential: &Credential,
    ) -> Result<Vec<String>, git2::Error> {
        {
            let mut callbacks = RemoteCallbacks::new();
            callbacks.credentials(credentials_callback(credential));
            let connection = remote.connect_auth(Direction::Fetch, Some(callbacks), None)?;
            // `list` is unsound on an empty advertisement. A resolvable HEAD
            // means at least one head was advertised.
            if connection.default_branch().is_ok() {
                let names = connection
                    .list()?
                    .iter()
                    .map(|head| head.name().to_string())
                    .collect::<Vec<_>>();
                return Ok(names);
            }
        }

        let url = remote
            .url()
            .ok_or_else(|| git2::Error::from_str("remote url is not valid utf-8"))?;
        debug!("remote has no resolvable HEAD, fetching its refs");
        self.fetch_remote_refs(url, credential)
    }

    /// Fetch every remote ref into a private namespace, read the names back
    /// and drop the namespace again. Works for empty remotes.
    fn fetch_remote_refs(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<Vec<String>, git2::Error> {
        let mut remote = self.repo.remote_anonymous(url)?;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(credentials_callback(credential));
        let mut options = FetchOptions::new();
        options
            .remote_callbacks(callbacks)
            .download_tags(AutotagOption::None);
        let refspec = format!("+refs/*:{REMOTE_REFS_NAMESPACE}*");
        remote.fetch(&[refspec.as_str()], Some(&mut options), None)?;

        let mut names = Vec::new();
        for reference in self
            .repo
            .references_glob(&format!("{REMOTE_REFS_NAMESPACE}*"))?
        {
            let mut reference = reference?;
            if let Some(name) = reference
                .name()
                .and_then(|name| name.strip_prefix(REMOTE_REFS_NAMESPACE))
                .map(|name| format!("refs/{name}"))
            {
                names.push(name);
            }
            reference.delete()?;
        }
        Ok(names)
    }
}

/// Direct (non-symbolic) refs under `refs/`.
fn local_refs(repo: &Repository) -> Result<Vec<String>, git2::Error> {
    let mut refs = Vec::new();
    for reference in repo.references()? {
        let reference = reference?;
        if reference.kind() == Some(ReferenceType::Symbolic) {
            continue;
        }
        if let Some(name) = reference.name()
            && is_mirrored_ref(name)
        {
            refs.push(name.to_string());
        }
    }
    refs.sort();
    Ok(refs)
}

fn is_mirrored_ref(name: &str) -> bool {
    name.starts_with("refs/") && !name.ends_with("^{}")
}

/// Forced update for every local ref, deletion for every advertised ref that
/// no longer exists locally.
pub(crate) fn mirror_refspecs(local: &[String], advertised: &[String]) -> Vec<String> {
    let mut refspecs: Vec<String> = local.iter().map(|name| format!("+{name}:{name}")).collect();
    for name in advertised {
        if is_mirrored_ref(name) && !local.contains(name) && !refspecs.contains(&format!(":{name}"))
        {
            refspecs.push(format!(":{name}"));
        }
    }
    refspecs
}

/// libgit2 keeps asking for credentials as long as the server rejects them,
/// so only one real attempt is answered.
fn credentials_callback(
    credential: &Credential,
) -> impl FnMut(&str, Option<&str>, CredentialType) -> Result<Cred, git2::Error> + '_ {
    let mut attempted = false;
    move |_url, username_from_url, allowed| {
        if allowed.contains(CredentialType::USERNAME) {
            let username = username_from_url
                .or(credential.username())
                .unwrap_or(SSH_USERNAME);
            return Cred::username(username);
        }
        if attempted {
            return Err(git2::Error::from_str("authentication failed"));
        }
        attempted = true;

        match credential {
            Credential::Anonymous => Err(git2::Error::from_str(
                "remote requires authentication but auth method is none",
            )),
            Credential::UserPass { username, password }
                if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) =>
            {
                Cred::userpass_plaintext(username, password)
            }
            Credential::SshKey { username, path } if allowed.contains(CredentialType::SSH_KEY) => {
                Cred::ssh_key(username_from_url.unwrap_or(username), None, path, None)
            }
            _ => Err(git2::Error::from_str(&format!(
                "configured credential is not accepted by the remote (allowed: {allowed:?})"
            ))),
        }
    }
}

fn print_progress(line: &str) {
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "\r{line}");
    let _ = stdout.flush();
}

fn print_sideband(data: &[u8]) -> bool {
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "remote: {}", String::from_utf8_lossy(data));
    let _ = stdout.flush();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mirror_refspecs_force_local_and_delete_stale() {
        let local = refs(&["refs/heads/main", "refs/tags/v1"]);
        let advertised = refs(&[
            "HEAD",
            "refs/heads/main",
            "refs/heads/stale",
            "refs/tags/v0",
            "refs/tags/v0^{}",
        ]);

        let specs = mirror_refspecs(&local, &advertised);
        assert_eq!(
            specs,
            refs(&[
                "+refs/heads/main:refs/heads/main",
                "+refs/tags/v1:refs/tags/v1",
                ":refs/heads/stale",
                ":refs/tags/v0",
            ])
        );
    }

    #[test]
    fn test_mirror_refspecs_empty_everywhere() {
        assert!(mirror_refspecs(&[], &refs(&["HEAD"])).is_empty());
    }

    #[test]
    fn test_is_mirrored_ref() {
        assert!(is_mirrored_ref("refs/heads/main"));
        assert!(is_mirrored_ref("refs/notes/commits"));
        assert!(!is_mirrored_ref("HEAD"));
        assert!(!is_mirrored_ref("refs/tags/v1^{}"));
    }
}
