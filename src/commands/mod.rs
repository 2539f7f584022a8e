//! CLI command implementations.

pub mod healthcheck;
pub mod once;
pub mod run;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::alerts::{AlertManager, Notifier};
use crate::cmd_abstraction::RealCommandExecutor;
use crate::config::Config;
use crate::dns::SystemResolver;
use crate::fetcher::Fetcher;
use crate::fs_abstraction::{real_fs, FileSystem, RealFileSystem};
use crate::git::GitCli;
use crate::health::{HealthSink, HealthState};
use crate::lock::LockGuard;
use crate::output::OutputWriter;
use crate::runner::{default_tasks, Runner};

/// Load the config file, apply environment overrides and validate.
pub fn load_config(config_path: &Path) -> Result<Config> {
    let fs = real_fs();
    let mut config = Config::load_or_default(fs, config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    config.apply_env()?;
    config.validate()?;
    config.check_files(fs)?;
    Ok(config)
}

/// Everything a command needs to run update cycles.
pub struct Session {
    pub config: Config,
    pub health: Arc<HealthState>,
    pub notifier: Arc<AlertManager>,
    pub runner: Runner,
    _lock: LockGuard,
}

impl Session {
    /// Lock and create the output directory, then wire up the runner.
    pub fn prepare(config_path: &Path) -> Result<Self> {
        let config = load_config(config_path)?;

        let lock = LockGuard::acquire(&config.output_dir)?;
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let output = OutputWriter::new(Arc::clone(&fs), &config.output_dir);
        output.ensure_dir()?;

        let fetcher = Arc::new(Fetcher::new(config.http_timeout())?);
        let tasks = default_tasks(
            &config,
            Arc::clone(&fetcher),
            Arc::new(SystemResolver),
            output,
        );

        let health = Arc::new(HealthState::new());
        let notifier = Arc::new(AlertManager::new(config.alerts.clone())?);
        let mut runner = Runner::new(
            tasks,
            Arc::clone(&health) as Arc<dyn HealthSink>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            config.period(),
        )
        .with_download_counter(fetcher);

        if config.git.enabled {
            let git = GitCli::new(
                Arc::new(RealCommandExecutor::new()),
                fs,
                &config.output_dir,
                &config.git,
            );
            runner = runner.with_git(Arc::new(git));
        }

        Ok(Self {
            config,
            health,
            notifier,
            runner,
            _lock: lock,
        })
    }
}
