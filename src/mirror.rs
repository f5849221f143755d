//! Mirror job execution: credentials, mirror clone, remote setup, mirror push.

use crate::auth::CredentialResolver;
use crate::config::{EndpointRole, MirrorJob, RunOptions};
use crate::error::MirrorError;
use crate::git::{GitTransport, MirrorRepository, SOURCE_REMOTE};
use tracing::{debug, instrument};

pub struct MirrorExecutor<T: GitTransport> {
    transport: T,
    resolver: CredentialResolver,
    options: RunOptions,
}

impl<T: GitTransport> MirrorExecutor<T> {
    pub fn new(transport: T, resolver: CredentialResolver, options: RunOptions) -> Self {
        Self {
            transport,
            resolver,
            options,
        }
    }

    /// Run one job's pipeline. Every step depends on the previous one, so the
    /// first failure is returned and nothing after it runs.
    #[instrument(skip_all, fields(job = %job.display_name()))]
    pub fn execute(&self, job: &MirrorJob) -> Result<(), MirrorError> {
        debug!("starting mirror operation");

        let target_credential =
            self.resolver
                .resolve(&job.target.auth)
                .map_err(|source| MirrorError::AuthSetup {
                    role: EndpointRole::Target,
                    source,
                })?;
        let source_credential =
            self.resolver
                .resolve(&job.source.auth)
                .map_err(|source| MirrorError::AuthSetup {
                    role: EndpointRole::Source,
                    source,
                })?;

        self.report(t!("mirror.cloning", url = job.target.url.as_str()));
        let mut repo = self
            .transport
            .clone_mirror(&job.target.url, &target_credential)
            .map_err(|source| MirrorError::Clone {
                url: job.target.url.clone(),
                source,
            })?;

        self.report(t!("mirror.adding_remote", url = job.source.url.as_str()));
        repo.add_remote(SOURCE_REMOTE, &job.source.url)
            .map_err(|source| MirrorError::RemoteSetup {
                remote: SOURCE_REMOTE.to_string(),
                url: job.source.url.clone(),
                source,
            })?;

        self.report(t!("mirror.pushing", url = job.source.url.as_str()));
        repo.push_mirror(SOURCE_REMOTE, &source_credential)
            .map_err(|source| MirrorError::Push {
                url: job.source.url.clone(),
                source,
            })?;

        debug!("mirror operation completed successfully");
        Ok(())
    }

    fn report(&self, line: impl std::fmt::Display) {
        if self.options.verbose {
            println!("{line}");
        }
    }
}
