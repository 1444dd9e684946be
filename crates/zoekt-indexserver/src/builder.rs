// Copyright 2025 HyperZoekt Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use std::error::Error;
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Commit recorded for repositories that exist but have no revision yet.
pub const EMPTY_REPO_COMMIT: &str = "404aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
/// Size of the all-zero archive fed to the builder for an empty repository.
pub const EMPTY_ARCHIVE_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSource {
    /// Archive fetched by the builder itself.
    Url(String),
    /// Archive bytes written to the builder's stdin (source argument `-`).
    Stdin(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub name: String,
    pub branch: String,
    pub commit: String,
    pub source: BuildSource,
    pub parallelism: Option<usize>,
}

impl BuildRequest {
    pub fn from_tarball(name: &str, commit: &str, url: String) -> Self {
        Self {
            name: name.to_string(),
            branch: "HEAD".to_string(),
            commit: commit.to_string(),
            source: BuildSource::Url(url),
            parallelism: Some(1),
        }
    }

    pub fn empty_repo(name: &str) -> Self {
        Self {
            name: name.to_string(),
            branch: "HEAD".to_string(),
            commit: EMPTY_REPO_COMMIT.to_string(),
            source: BuildSource::Stdin(vec![0u8; EMPTY_ARCHIVE_LEN]),
            parallelism: None,
        }
    }

    pub fn is_empty_repo(&self) -> bool {
        self.commit == EMPTY_REPO_COMMIT
    }

    /// Builder arguments, without the program name.
    pub fn args(&self, index_dir: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(12);
        if let Some(n) = self.parallelism {
            args.push(format!("-parallelism={}", n));
        }
        args.extend([
            "-index".to_string(),
            index_dir.display().to_string(),
            "-incremental".to_string(),
            "-branch".to_string(),
            self.branch.clone(),
            "-commit".to_string(),
            self.commit.clone(),
            "-name".to_string(),
            self.name.clone(),
        ]);
        args.push(match &self.source {
            BuildSource::Url(u) => u.clone(),
            BuildSource::Stdin(_) => "-".to_string(),
        });
        args
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug)]
pub enum BuildError {
    /// The program could not be started at all.
    Spawn { program: String, source: std::io::Error },
    /// The program ran and exited unsuccessfully.
    Failed {
        status: Option<i32>,
        output: BuildOutput,
    },
    /// Talking to the running child failed.
    Io(std::io::Error),
}

impl Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Spawn { program, source } => write!(f, "spawn {}: {}", program, source),
            BuildError::Failed { status: Some(code), .. } => {
                write!(f, "builder exited with status {}", code)
            }
            BuildError::Failed { status: None, .. } => write!(f, "builder killed by signal"),
            BuildError::Io(e) => write!(f, "builder io: {}", e),
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BuildError::Spawn { source, .. } => Some(source),
            BuildError::Io(e) => Some(e),
            BuildError::Failed { .. } => None,
        }
    }
}

impl BuildError {
    /// Captured output when the program ran.
    pub fn output(&self) -> Option<&BuildOutput> {
        match self {
            BuildError::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ShardBuilder: Send + Sync {
    async fn build(&self, req: &BuildRequest) -> Result<BuildOutput, BuildError>;
}

/// Runs an external archive indexer, one process per request.
pub struct ArchiveIndexCommand {
    program: PathBuf,
    index_dir: PathBuf,
}

impl ArchiveIndexCommand {
    pub fn new(program: &str, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: resolve_program(program),
            index_dir: index_dir.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }
}

/// A bare program name is preferred from the directory of the running
/// executable, so sibling tools work without touching `PATH`.
fn resolve_program(program: &str) -> PathBuf {
    let p = PathBuf::from(program);
    if p.components().count() != 1 {
        return p;
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(program)))
        .filter(|candidate| candidate.is_file())
        .unwrap_or(p)
}

#[async_trait]
impl ShardBuilder for ArchiveIndexCommand {
    async fn build(&self, req: &BuildRequest) -> Result<BuildOutput, BuildError> {
        let args = req.args(&self.index_dir);
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Never let the builder wait for input it will not get.
        cmd.stdin(match req.source {
            BuildSource::Stdin(_) => Stdio::piped(),
            BuildSource::Url(_) => Stdio::null(),
        });

        tracing::debug!(program = %self.program.display(), args = ?args, "running builder");
        let mut child = cmd.spawn().map_err(|e| BuildError::Spawn {
            program: self.program.display().to_string(),
            source: e,
        })?;

        let writer = match (&req.source, child.stdin.take()) {
            (BuildSource::Stdin(bytes), Some(mut stdin)) => {
                let bytes = bytes.clone();
                Some(tokio::spawn(async move {
                    stdin.write_all(&bytes).await?;
                    stdin.shutdown().await
                }))
            }
            _ => None,
        };

        let out = child.wait_with_output().await.map_err(BuildError::Io)?;
        if let Some(w) = writer {
            if let Ok(Err(e)) = w.await {
                tracing::debug!(repo = %req.name, error = %e, "builder closed stdin early");
            }
        }

        let output = BuildOutput {
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        };
        if out.status.success() {
            Ok(output)
        } else {
            Err(BuildError::Failed {
                status: out.status.code(),
                output,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tarball_build_arguments() {
        let req = BuildRequest::from_tarball(
            "github.com/foo/bar",
            "deadbeef",
            "http://sg/.internal/git/github.com/foo/bar/tar/deadbeef".into(),
        );
        assert_eq!(
            req.args(Path::new("/data/index")),
            vec![
                "-parallelism=1",
                "-index",
                "/data/index",
                "-incremental",
                "-branch",
                "HEAD",
                "-commit",
                "deadbeef",
                "-name",
                "github.com/foo/bar",
                "http://sg/.internal/git/github.com/foo/bar/tar/deadbeef",
            ]
        );
    }

    #[test]
    fn empty_repo_reads_zeros_from_stdin() {
        let req = BuildRequest::empty_repo("github.com/foo/empty");
        assert!(req.is_empty_repo());
        assert_eq!(req.commit.len(), 40);
        assert_eq!(req.source, BuildSource::Stdin(vec![0; 1024]));
        let args = req.args(Path::new("/idx"));
        assert_eq!(args.first().map(String::as_str), Some("-index"));
        assert_eq!(args.last().map(String::as_str), Some("-"));
        assert!(args.contains(&EMPTY_REPO_COMMIT.to_string()));
    }

    #[test]
    fn paths_with_separators_are_kept() {
        assert_eq!(resolve_program("/opt/bin/x"), PathBuf::from("/opt/bin/x"));
        assert_eq!(
            resolve_program("surely-not-next-to-the-test-binary"),
            PathBuf::from("surely-not-next-to-the-test-binary")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_is_reported() {
        let td = tempfile::tempdir().unwrap();
        let ok = ArchiveIndexCommand::new("true", td.path());
        ok.build(&BuildRequest::empty_repo("r")).await.unwrap();

        let bad = ArchiveIndexCommand::new("false", td.path());
        let err = bad
            .build(&BuildRequest::from_tarball("r", "c", "http://x".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Failed { status: Some(1), .. }));
        assert!(err.output().is_some());

        let missing = ArchiveIndexCommand::new("/nonexistent/zoekt-archive-index", td.path());
        let err = missing
            .build(&BuildRequest::empty_repo("r"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }));
    }
}
