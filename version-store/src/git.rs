use crate::FileEntry;
use crate::Result;
use crate::VersionStore;
use crate::VersionStoreError;
use crate::VersionedFile;
use crate::path_matches;
use async_trait::async_trait;
use corpus_model::VersionId;
use std::path::Path;
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Snapshots backed by commits of a local git repository. Paths are
/// relative to the repository root.
#[derive(Clone, Debug)]
pub struct GitVersionStore {
    repo: PathBuf,
}

impl GitVersionStore {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    async fn git(&self, args: &[&str]) -> Result<Output> {
        debug!(repo = %self.repo.display(), ?args, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()
            .await?;
        Ok(output)
    }

    async fn tree_entries(&self, version: &VersionId) -> Result<Vec<FileEntry>> {
        check_reference(version.as_str())?;
        let output = self
            .git(&["ls-tree", "-r", "-l", "-z", version.as_str()])
            .await?;
        if !output.status.success() {
            return Err(git_failure("ls-tree", &output));
        }
        let mut entries = Vec::new();
        for record in output.stdout.split(|byte| *byte == 0) {
            if record.is_empty() {
                continue;
            }
            let record = String::from_utf8_lossy(record);
            let (meta, path) = record
                .split_once('\t')
                .ok_or_else(|| VersionStoreError::Malformed(record.to_string()))?;
            let mut fields = meta.split_whitespace();
            let kind = fields.nth(1);
            if kind != Some("blob") {
                continue;
            }
            let size = fields
                .nth(1)
                .and_then(|size| size.parse::<u64>().ok())
                .ok_or_else(|| VersionStoreError::Malformed(record.to_string()))?;
            entries.push(FileEntry {
                path: path.to_string(),
                size,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

#[async_trait]
impl VersionStore for GitVersionStore {
    async fn resolve_version(&self, reference: &str) -> Result<Option<VersionId>> {
        check_reference(reference)?;
        let spec = format!("{reference}^{{commit}}");
        let output = self
            .git(&["rev-parse", "--verify", "--quiet", spec.as_str()])
            .await?;
        if !output.status.success() {
            return Ok(None);
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if sha.is_empty() {
            return Ok(None);
        }
        Ok(Some(VersionId::new(sha)))
    }

    async fn list_files(&self, version: &VersionId, pattern: &str) -> Result<Vec<VersionedFile>> {
        let mut files = Vec::new();
        for entry in self.list_entries(version, pattern).await? {
            if let Some(bytes) = self.read_file(version, &entry.path).await? {
                files.push(VersionedFile {
                    path: entry.path,
                    bytes,
                });
            }
        }
        Ok(files)
    }

    async fn read_file(&self, version: &VersionId, path: &str) -> Result<Option<Vec<u8>>> {
        check_reference(version.as_str())?;
        let object = format!("{}:{path}", version.as_str());
        let output = self.git(&["cat-file", "blob", object.as_str()]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }

    async fn list_entries(&self, version: &VersionId, pattern: &str) -> Result<Vec<FileEntry>> {
        let entries = self.tree_entries(version).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| path_matches(pattern, &entry.path))
            .collect())
    }
}

/// Rejects references git would read as an option.
fn check_reference(reference: &str) -> Result<()> {
    if reference.is_empty() || reference.starts_with('-') {
        return Err(VersionStoreError::InvalidReference(reference.to_string()));
    }
    Ok(())
}

fn git_failure(command: &str, output: &Output) -> VersionStoreError {
    VersionStoreError::Git {
        command: command.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn git_available() -> bool {
        StdCommand::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn run(dir: &Path, args: &[&str]) {
        let status = StdCommand::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .expect("spawn git");
        assert!(status.success(), "git {args:?} failed");
    }

    fn repo_with_content() -> TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        run(root, &["init", "-q"]);
        run(root, &["config", "user.email", "test@example.com"]);
        run(root, &["config", "user.name", "Test"]);
        std::fs::create_dir_all(root.join("content/physics")).expect("mkdir");
        std::fs::write(root.join("content/physics/b.json"), r#"{"id":"b"}"#).expect("write");
        std::fs::write(root.join("content/a.json"), r#"{"id":"a"}"#).expect("write");
        std::fs::write(root.join("README.md"), "readme").expect("write");
        run(root, &["add", "."]);
        run(root, &["commit", "-q", "-m", "initial"]);
        run(root, &["tag", "release"]);
        dir
    }

    #[tokio::test]
    async fn reads_a_committed_snapshot() {
        if !git_available() {
            return;
        }
        let dir = repo_with_content();
        let store = GitVersionStore::new(dir.path());

        let version = store
            .resolve_version("release")
            .await
            .expect("resolve")
            .expect("tag exists");
        assert_eq!(version.as_str().len(), 40);

        let files = store
            .list_files(&version, "content/*.json")
            .await
            .expect("list");
        let paths: Vec<&str> = files.iter().map(|file| file.path.as_str()).collect();
        assert_eq!(paths, vec!["content/a.json", "content/physics/b.json"]);
        assert_eq!(files[0].bytes, br#"{"id":"a"}"#.to_vec());

        assert_eq!(
            store
                .read_file(&version, "content/missing.json")
                .await
                .expect("read"),
            None
        );
        assert_eq!(
            store.resolve_version("no-such-ref").await.expect("resolve"),
            None
        );
    }

    #[tokio::test]
    async fn option_like_references_are_rejected() {
        let store = GitVersionStore::new(".");
        assert_matches!(
            store.resolve_version("--all").await,
            Err(VersionStoreError::InvalidReference(_))
        );
    }
}
