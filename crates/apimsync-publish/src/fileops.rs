//! Snapshot file access
//!
//! [`FileOps`] is the narrow capability the publisher consumes: read a file,
//! list subdirectories, enumerate every service file. Implementations cover
//! the live working tree and a named git commit, so the same traversal code
//! serves both full publishes and commit-scoped diffs. All paths are
//! relative to the service directory.

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;

use crate::error::{PublishError, Result};

#[async_trait]
pub trait FileOps: Send + Sync {
    /// File contents, `None` when the file does not exist in this view.
    async fn read_file(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Immediate subdirectories of `dir` in this view.
    async fn sub_directories(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Every file under the service directory, service-relative.
    async fn service_files(&self) -> Result<Vec<PathBuf>>;
}

/// How a commit touched a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Deleted,
    Written,
}

/// The live working tree rooted at the service directory.
pub struct LiveFs {
    root: PathBuf,
}

impl LiveFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileOps for LiveFs {
    async fn read_file(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.root.join(path)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn sub_directories(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let absolute = self.root.join(dir);
        let mut directories = Vec::new();
        let mut entries = match tokio::fs::read_dir(&absolute).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(directories),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                directories.push(dir.join(entry.file_name()));
            }
        }
        Ok(directories)
    }

    async fn service_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
            })?;
            if entry.file_type().is_file() {
                let relative = entry
                    .path()
                    .strip_prefix(&self.root)
                    .expect("walked entries live under the root");
                files.push(relative.to_path_buf());
            }
        }
        Ok(files)
    }
}

/// A view with no files; stands in for "previous" on a full publish or a
/// root commit.
pub struct EmptyFs;

#[async_trait]
impl FileOps for EmptyFs {
    async fn read_file(&self, _path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn sub_directories(&self, _dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    async fn service_files(&self) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// The service tree as recorded in one git commit.
pub struct GitFs {
    repo_root: PathBuf,
    commit: String,
    /// Service directory, relative to the repository root.
    service_prefix: PathBuf,
}

fn run_git(repo_root: &Path, args: &[&str]) -> Result<std::process::Output> {
    Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .map_err(|e| PublishError::Git {
            command: args.join(" "),
            message: e.to_string(),
        })
}

fn git_stdout(repo_root: &Path, args: &[&str]) -> Result<String> {
    let output = run_git(repo_root, args)?;
    if !output.status.success() {
        return Err(PublishError::Git {
            command: args.join(" "),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl GitFs {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        commit: impl Into<String>,
        service_prefix: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            commit: commit.into(),
            service_prefix: service_prefix.into(),
        }
    }

    /// The repository root that contains `path`.
    pub fn discover_root(path: &Path) -> Result<PathBuf> {
        let stdout = git_stdout(path, &["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(stdout.trim()))
    }

    /// The same view at the commit's first parent; `None` for a root commit.
    pub fn parent(&self) -> Result<Option<GitFs>> {
        let parent_ref = format!("{}^", self.commit);
        let output = run_git(&self.repo_root, &["rev-parse", "--verify", "--quiet", &parent_ref])?;
        if !output.status.success() {
            return Ok(None);
        }
        let commit = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(GitFs::new(
            self.repo_root.clone(),
            commit,
            self.service_prefix.clone(),
        )))
    }

    fn repo_path(&self, path: &Path) -> String {
        self.service_prefix.join(path).to_string_lossy().into_owned()
    }

    /// Files the commit touched under the service directory, with their
    /// change status, service-relative.
    pub fn changed_files(&self) -> Result<Vec<(ChangeStatus, PathBuf)>> {
        let stdout = git_stdout(
            &self.repo_root,
            &[
                "diff-tree",
                "--no-commit-id",
                "--name-status",
                "-r",
                "--root",
                &self.commit,
            ],
        )?;
        let mut changes = Vec::new();
        for line in stdout.lines() {
            let Some((status, path)) = line.split_once('\t') else {
                continue;
            };
            let Ok(relative) = Path::new(path).strip_prefix(&self.service_prefix) else {
                continue;
            };
            let status = if status.starts_with('D') {
                ChangeStatus::Deleted
            } else {
                ChangeStatus::Written
            };
            changes.push((status, relative.to_path_buf()));
        }
        Ok(changes)
    }
}

#[async_trait]
impl FileOps for GitFs {
    async fn read_file(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let object = format!("{}:{}", self.commit, self.repo_path(path));
        let output = run_git(&self.repo_root, &["show", &object])?;
        if output.status.success() {
            return Ok(Some(output.stdout));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("does not exist") || stderr.contains("exists on disk, but not in") {
            return Ok(None);
        }
        Err(PublishError::Git {
            command: format!("show {object}"),
            message: stderr.trim().to_string(),
        })
    }

    async fn sub_directories(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let spec = format!("{}/", self.repo_path(dir));
        let stdout = git_stdout(&self.repo_root, &["ls-tree", &self.commit, "--", &spec])?;
        let mut directories = Vec::new();
        for line in stdout.lines() {
            // "<mode> <type> <hash>\t<path>"
            let Some((meta, path)) = line.split_once('\t') else {
                continue;
            };
            if !meta.contains(" tree ") {
                continue;
            }
            if let Ok(relative) = Path::new(path).strip_prefix(&self.service_prefix) {
                directories.push(relative.to_path_buf());
            }
        }
        Ok(directories)
    }

    async fn service_files(&self) -> Result<Vec<PathBuf>> {
        let prefix = self.service_prefix.to_string_lossy();
        let args: Vec<&str> = if prefix.is_empty() || prefix == "." {
            vec!["ls-tree", "-r", "--name-only", &self.commit]
        } else {
            vec!["ls-tree", "-r", "--name-only", &self.commit, "--", &prefix]
        };
        let stdout = git_stdout(&self.repo_root, &args)?;
        let mut files = Vec::new();
        for line in stdout.lines() {
            if line.is_empty() {
                continue;
            }
            if let Ok(relative) = Path::new(line).strip_prefix(&self.service_prefix) {
                files.push(relative.to_path_buf());
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "user.name", "Test User"],
        ] {
            Command::new("git")
                .args(&args)
                .current_dir(dir)
                .output()
                .expect("git setup");
        }
    }

    fn commit_all(dir: &Path, message: &str) -> String {
        Command::new("git")
            .args(["add", "-A"])
            .current_dir(dir)
            .output()
            .expect("git add");
        Command::new("git")
            .args(["commit", "-m", message])
            .current_dir(dir)
            .output()
            .expect("git commit");
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(dir)
            .output()
            .expect("git rev-parse");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    #[tokio::test]
    async fn live_fs_reads_and_enumerates() {
        let temp = tempfile::tempdir().unwrap();
        let service = temp.path().join("svc");
        std::fs::create_dir_all(service.join("products/p1")).unwrap();
        std::fs::write(service.join("products/p1/productInformation.json"), b"{}").unwrap();

        let ops = LiveFs::new(&service);
        let files = ops.service_files().await.unwrap();
        assert_eq!(files, vec![PathBuf::from("products/p1/productInformation.json")]);
        assert!(ops
            .read_file(Path::new("products/p1/productInformation.json"))
            .await
            .unwrap()
            .is_some());
        assert!(ops.read_file(Path::new("missing.json")).await.unwrap().is_none());
        assert_eq!(
            ops.sub_directories(Path::new("products")).await.unwrap(),
            vec![PathBuf::from("products/p1")]
        );
    }

    #[tokio::test]
    async fn git_fs_reads_the_named_commit() {
        let temp = tempfile::tempdir().unwrap();
        init_repo(temp.path());
        let service = temp.path().join("svc");
        std::fs::create_dir_all(service.join("backends/b1")).unwrap();
        std::fs::write(service.join("backends/b1/backendInformation.json"), b"{\"v\":1}").unwrap();
        let first = commit_all(temp.path(), "add backend");

        std::fs::remove_dir_all(service.join("backends")).unwrap();
        std::fs::create_dir_all(service.join("tags/t1")).unwrap();
        std::fs::write(service.join("tags/t1/tagInformation.json"), b"{}").unwrap();
        let second = commit_all(temp.path(), "swap backend for tag");

        let at_first = GitFs::new(temp.path(), first, "svc");
        let files = at_first.service_files().await.unwrap();
        assert_eq!(files, vec![PathBuf::from("backends/b1/backendInformation.json")]);
        assert_eq!(
            at_first
                .read_file(Path::new("backends/b1/backendInformation.json"))
                .await
                .unwrap(),
            Some(b"{\"v\":1}".to_vec())
        );

        let at_second = GitFs::new(temp.path(), second.clone(), "svc");
        assert!(at_second
            .read_file(Path::new("backends/b1/backendInformation.json"))
            .await
            .unwrap()
            .is_none());

        let changes = at_second.changed_files().unwrap();
        assert!(changes.contains(&(
            ChangeStatus::Deleted,
            PathBuf::from("backends/b1/backendInformation.json")
        )));
        assert!(changes.contains(&(
            ChangeStatus::Written,
            PathBuf::from("tags/t1/tagInformation.json")
        )));

        let previous = at_second.parent().unwrap().expect("second commit has a parent");
        assert_eq!(
            previous.service_files().await.unwrap(),
            vec![PathBuf::from("backends/b1/backendInformation.json")]
        );
    }

    #[tokio::test]
    async fn root_commits_have_no_parent_view() {
        let temp = tempfile::tempdir().unwrap();
        init_repo(temp.path());
        std::fs::create_dir_all(temp.path().join("svc")).unwrap();
        std::fs::write(temp.path().join("svc/policy.xml"), b"<policies/>").unwrap();
        let root = commit_all(temp.path(), "initial");

        let ops = GitFs::new(temp.path(), root, "svc");
        assert!(ops.parent().unwrap().is_none());
    }
}
