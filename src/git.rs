//! Git snapshots of the output directory.
//!
//! The output directory doubles as a working copy of a remote repository.
//! Each cycle pulls first, and a fully successful cycle commits and pushes
//! whatever changed.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cmd_abstraction::{args_to_strings, CommandExecutor, CommandOutput};
use crate::config::GitConfig;
use crate::fs_abstraction::FileSystem;

const GIT: &str = "git";

/// Keeps the output directory in sync with a remote repository.
#[async_trait]
pub trait GitUploader: Send + Sync {
    /// Bring the working copy up to date with the remote
    async fn pull(&self) -> Result<()>;

    /// Commit every change in the working copy and push it.
    async fn upload_all_changes(&self, message: &str) -> Result<()>;
}

/// Uploader driving the `git` binary.
#[derive(Clone)]
pub struct GitCli {
    executor: Arc<dyn CommandExecutor>,
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    url: String,
    ssh_command: String,
}

impl GitCli {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        fs: Arc<dyn FileSystem>,
        dir: &Path,
        config: &GitConfig,
    ) -> Self {
        let ssh_command = format!(
            "ssh -i {} -o UserKnownHostsFile={} -o IdentitiesOnly=yes",
            config.ssh_key.display(),
            config.ssh_known_hosts.display()
        );
        Self {
            executor,
            fs,
            dir: dir.to_path_buf(),
            url: config.url.clone(),
            ssh_command,
        }
    }

    /// Run `git` on the working copy with the SSH settings applied.
    fn git(&self, args: &[&str]) -> Result<CommandOutput> {
        let dir = self.dir.to_string_lossy();
        let ssh = format!("core.sshCommand={}", self.ssh_command);
        let mut full = args_to_strings(&["-C", &dir, "-c", &ssh]);
        full.extend(args_to_strings(args));

        debug!("git {}", args.join(" "));
        self.executor.execute(GIT, &full)
    }

    fn git_ok(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.git(args)?;
        if !output.success {
            bail!("git {} failed: {}", args[0], output.message());
        }
        Ok(output)
    }

    fn is_repository(&self) -> bool {
        self.fs.exists(&self.dir.join(".git"))
    }

    fn clone_repository(&self) -> Result<()> {
        info!("Cloning {} into {}", self.url, self.dir.display());
        let ssh = format!("core.sshCommand={}", self.ssh_command);
        let dir = self.dir.to_string_lossy();
        let args = args_to_strings(&["clone", "-c", &ssh, &self.url, &dir]);
        let output = self.executor.execute(GIT, &args)?;
        if !output.success {
            bail!("git clone failed: {}", output.message());
        }
        Ok(())
    }

    fn pull_blocking(&self) -> Result<()> {
        if !self.is_repository() {
            return self.clone_repository();
        }
        self.git_ok(&["pull", "--rebase"])
            .context("cannot pull from origin")?;
        Ok(())
    }

    fn upload_blocking(&self, message: &str) -> Result<()> {
        self.git_ok(&["add", "--all"])?;

        let output = self.git(&[
            "-c",
            "user.name=updated",
            "-c",
            "user.email=updated@localhost",
            "commit",
            "-m",
            message,
        ])?;
        if !output.success {
            if is_nothing_to_commit(&output) {
                info!("Nothing to commit");
                return Ok(());
            }
            bail!("git commit failed: {}", output.message());
        }

        self.git_ok(&["push"])?;
        Ok(())
    }
}

fn is_nothing_to_commit(output: &CommandOutput) -> bool {
    output.stdout.contains("nothing to commit") || output.stderr.contains("nothing to commit")
}

#[async_trait]
impl GitUploader for GitCli {
    async fn pull(&self) -> Result<()> {
        let cli = self.clone();
        tokio::task::spawn_blocking(move || cli.pull_blocking())
            .await
            .context("git task panicked")?
    }

    async fn upload_all_changes(&self, message: &str) -> Result<()> {
        let cli = self.clone();
        let message = message.to_string();
        let msg = message.clone();
        tokio::task::spawn_blocking(move || cli.upload_blocking(&msg))
            .await
            .context("git task panicked")??;
        info!("Committed to Git: {}", message);
        Ok(())
    }
}

/// Commit message for the snapshot taken on `date`
pub fn commit_message(date: chrono::NaiveDate) -> String {
    format!("Update of {}", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd_abstraction::MockCommandExecutor;
    use crate::fs_abstraction::MockFileSystem;
    use mockall::Sequence;

    fn config() -> GitConfig {
        GitConfig {
            enabled: true,
            url: "git@github.com:owner/files.git".to_string(),
            ssh_key: PathBuf::from("/keys/key"),
            ssh_known_hosts: PathBuf::from("/keys/known_hosts"),
        }
    }

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            success: true,
            code: Some(0),
            ..Default::default()
        }
    }

    fn failed(stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            success: false,
            code: Some(1),
        }
    }

    fn fs_with_repo(present: bool) -> Arc<MockFileSystem> {
        let mut fs = MockFileSystem::new();
        fs.expect_exists()
            .withf(|p| p.ends_with(".git"))
            .returning(move |_| present);
        Arc::new(fs)
    }

    fn cli(executor: MockCommandExecutor, fs: Arc<MockFileSystem>) -> GitCli {
        GitCli::new(Arc::new(executor), fs, Path::new("/files"), &config())
    }

    fn has(args: &[String], word: &str) -> bool {
        args.iter().any(|a| a == word)
    }

    #[test]
    fn test_commit_message() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(commit_message(date), "Update of 2024-03-07");
    }

    #[tokio::test]
    async fn test_pull_clones_when_not_a_repository() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .withf(|cmd, args| {
                cmd == "git"
                    && args[0] == "clone"
                    && has(args, "git@github.com:owner/files.git")
                    && args.last().map(String::as_str) == Some("/files")
                    && args.iter().any(|a| a.contains("-i /keys/key"))
            })
            .times(1)
            .returning(|_, _| Ok(ok("")));

        cli(executor, fs_with_repo(false)).pull().await.unwrap();
    }

    #[tokio::test]
    async fn test_pull_rebases_existing_repository() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .withf(|_, args| args[..2] == ["-C".to_string(), "/files".to_string()] && has(args, "pull"))
            .times(1)
            .returning(|_, _| Ok(ok("Already up to date.")));

        cli(executor, fs_with_repo(true)).pull().await.unwrap();
    }

    #[tokio::test]
    async fn test_pull_failure() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _| Ok(failed("", "fatal: Could not read from remote repository.")));

        let err = cli(executor, fs_with_repo(true)).pull().await.unwrap_err();
        assert!(format!("{err:#}").contains("Could not read from remote"));
    }

    #[tokio::test]
    async fn test_upload_adds_commits_and_pushes() {
        let mut executor = MockCommandExecutor::new();
        let mut seq = Sequence::new();
        executor
            .expect_execute()
            .withf(|_, args| has(args, "add") && has(args, "--all"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ok("")));
        executor
            .expect_execute()
            .withf(|_, args| has(args, "commit") && has(args, "Update of 2024-03-07"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ok("1 file changed")));
        executor
            .expect_execute()
            .withf(|_, args| has(args, "push"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ok("")));

        cli(executor, fs_with_repo(true))
            .upload_all_changes("Update of 2024-03-07")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_nothing_to_commit_is_not_an_error() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .withf(|_, args| has(args, "add"))
            .returning(|_, _| Ok(ok("")));
        executor
            .expect_execute()
            .withf(|_, args| has(args, "commit"))
            .returning(|_, _| Ok(failed("nothing to commit, working tree clean", "")));
        executor
            .expect_execute()
            .withf(|_, args| has(args, "push"))
            .never();

        cli(executor, fs_with_repo(true))
            .upload_all_changes("Update of 2024-03-07")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_push_failure() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute()
            .withf(|_, args| !has(args, "push"))
            .returning(|_, _| Ok(ok("")));
        executor
            .expect_execute()
            .withf(|_, args| has(args, "push"))
            .returning(|_, _| Ok(failed("", "rejected")));

        let err = cli(executor, fs_with_repo(true))
            .upload_all_changes("msg")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("git push failed"));
    }
}
