//! Boundary to the git transport.
//!
//! The mirror pipeline only needs three things from git: clone a repository
//! as a full mirror, add a remote, and push every ref as a forced mirror
//! update. [`GitTransport`] and [`MirrorRepository`] capture exactly that, so
//! the pipeline can run against [`Git2Transport`] or an in-process double.

mod git2_transport;

pub use git2_transport::{Git2Repository, Git2Transport, MIRROR_REFSPEC};

use crate::auth::Credential;
use crate::error::TransportError;

/// Name of the remote the mirror is pushed to.
pub const SOURCE_REMOTE: &str = "source";

pub trait GitTransport {
    type Repository: MirrorRepository;

    /// Clone every ref of `url` (branches, tags, everything under `refs/`)
    /// into a private repository that is discarded when dropped.
    fn clone_mirror(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<Self::Repository, TransportError>;
}

pub trait MirrorRepository {
    fn add_remote(&mut self, name: &str, url: &str) -> Result<(), TransportError>;

    /// Make the remote's refs match the local ones exactly: forced updates
    /// for every local ref and deletion of every remote ref missing locally.
    fn push_mirror(&mut self, remote: &str, credential: &Credential)
    -> Result<(), TransportError>;
}
