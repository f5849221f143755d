#![allow(dead_code)]

use git2::{Oid, Repository, Signature};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn git_mirror_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_git-mirror"))
}

pub fn run_git_mirror(args: &[&str], work_dir: &Path) -> Output {
    Command::new(git_mirror_bin())
        .args(args)
        .current_dir(work_dir)
        .env_remove("GIT_MIRROR_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("run git-mirror")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Scratch area holding bare repositories and config files for one test.
pub struct TestEnvironment {
    temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.path().join("config.yaml");
        fs::write(&path, content).expect("Failed to write config file");
        path
    }

    pub fn bare_repo(&self, name: &str) -> (PathBuf, Repository) {
        let path = self.path().join(name);
        let repo = Repository::init_bare(&path).expect("init bare repo");
        (path, repo)
    }
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

/// Create a commit with an empty tree on `refname` and return its id.
pub fn commit(repo: &Repository, refname: &str, message: &str) -> Oid {
    let sig = Signature::now("Mirror Test", "mirror@example.com").expect("signature");
    let tree_id = repo
        .treebuilder(None)
        .expect("treebuilder")
        .write()
        .expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    let parent = repo
        .find_reference(refname)
        .ok()
        .and_then(|r| r.target())
        .map(|oid| repo.find_commit(oid).expect("parent commit"));
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(Some(refname), &sig, &sig, message, &tree, &parents)
        .expect("commit")
}

pub fn tag(repo: &Repository, name: &str, target: Oid) {
    let object = repo.find_object(target, None).expect("find object");
    repo.tag_lightweight(name, &object, false)
        .expect("lightweight tag");
}

/// Sorted `(name, oid)` pairs for every direct ref of a repository.
pub fn ref_snapshot(repo: &Repository) -> Vec<(String, Oid)> {
    let mut refs: Vec<_> = repo
        .references()
        .expect("references")
        .filter_map(|r| r.ok())
        .filter_map(|r| Some((r.name()?.to_string(), r.target()?)))
        .collect();
    refs.sort();
    refs
}

pub fn mirror_config(target: &Path, source: &Path) -> String {
    format!(
        r#"
mirrors:
  - name: local
    target:
      url: "{}"
      auth:
        method: none
    source:
      url: "{}"
      auth:
        method: none
"#,
        path_str(target),
        path_str(source)
    )
}
