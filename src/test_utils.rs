use crate::auth::{AuthSpec, Credential};
use crate::config::{ENV_CONFIG_PATH, Endpoint, MirrorJob};
use crate::error::TransportError;
use crate::git::{GitTransport, MirrorRepository};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::env;
use std::ffi::OsString;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard};

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Pins `GIT_MIRROR_CONFIG` for one test and restores it on drop. Holds a
/// global lock so tests touching the variable run one at a time.
#[must_use]
pub struct ConfigPathEnv {
    _lock: MutexGuard<'static, ()>,
    previous: Option<OsString>,
}

impl ConfigPathEnv {
    pub fn unset() -> Self {
        let guard = Self::capture();
        unsafe {
            env::remove_var(ENV_CONFIG_PATH);
        }
        guard
    }

    pub fn set(value: &str) -> Self {
        let guard = Self::capture();
        unsafe {
            env::set_var(ENV_CONFIG_PATH, value);
        }
        guard
    }

    fn capture() -> Self {
        Self {
            _lock: ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner()),
            previous: env::var_os(ENV_CONFIG_PATH),
        }
    }
}

impl Drop for ConfigPathEnv {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { env::set_var(ENV_CONFIG_PATH, value) },
            None => unsafe { env::remove_var(ENV_CONFIG_PATH) },
        }
    }
}

pub fn job(index: usize, target: &str, source: &str) -> MirrorJob {
    MirrorJob {
        index,
        name: format!("job-{index}"),
        target: Endpoint {
            url: target.to_string(),
            auth: AuthSpec::None,
        },
        source: Endpoint {
            url: source.to_string(),
            auth: AuthSpec::None,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Clone { url: String, credential: Credential },
    AddRemote { name: String, url: String },
    Push { remote: String, credential: Credential },
}

#[derive(Debug, Clone, Default)]
struct Failures {
    clone: HashSet<String>,
    add_remote: HashSet<String>,
    push: HashSet<String>,
}

/// Transport double that records every call and fails on chosen URLs.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    calls: Rc<RefCell<Vec<Call>>>,
    failures: Failures,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_clone(mut self, url: &str) -> Self {
        self.failures.clone.insert(url.to_string());
        self
    }

    pub fn fail_add_remote(mut self, url: &str) -> Self {
        self.failures.add_remote.insert(url.to_string());
        self
    }

    pub fn fail_push(mut self, url: &str) -> Self {
        self.failures.push.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn cloned_urls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Clone { url, .. } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }
}

impl GitTransport for FakeTransport {
    type Repository = FakeRepository;

    fn clone_mirror(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<FakeRepository, TransportError> {
        self.calls.borrow_mut().push(Call::Clone {
            url: url.to_string(),
            credential: credential.clone(),
        });
        if self.failures.clone.contains(url) {
            return Err(TransportError::Other(format!(
                "repository not found: {url}"
            )));
        }
        Ok(FakeRepository {
            calls: Rc::clone(&self.calls),
            failures: self.failures.clone(),
            remotes: HashMap::new(),
        })
    }
}

#[derive(Debug)]
pub struct FakeRepository {
    calls: Rc<RefCell<Vec<Call>>>,
    failures: Failures,
    remotes: HashMap<String, String>,
}

impl MirrorRepository for FakeRepository {
    fn add_remote(&mut self, name: &str, url: &str) -> Result<(), TransportError> {
        self.calls.borrow_mut().push(Call::AddRemote {
            name: name.to_string(),
            url: url.to_string(),
        });
        if self.failures.add_remote.contains(url) {
            return Err(TransportError::Other(format!("invalid url: {url}")));
        }
        self.remotes.insert(name.to_string(), url.to_string());
        Ok(())
    }

    fn push_mirror(
        &mut self,
        remote: &str,
        credential: &Credential,
    ) -> Result<(), TransportError> {
        self.calls.borrow_mut().push(Call::Push {
            remote: remote.to_string(),
            credential: credential.clone(),
        });
        let url = self
            .remotes
            .get(remote)
            .ok_or_else(|| TransportError::Other(format!("remote '{remote}' does not exist")))?;
        if self.failures.push.contains(url) {
            return Err(TransportError::Rejected {
                refs: vec![(
                    "refs/heads/main".to_string(),
                    "protected branch hook declined".to_string(),
                )],
            });
        }
        Ok(())
    }
}
