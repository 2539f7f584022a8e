//! Update cycle orchestration.
//!
//! A cycle runs every build task concurrently, waits for all of them and
//! folds their failures into one [`RunError`]. The outcome always reaches the
//! health sink, failures also go to the notifier, and only a clean cycle is
//! uploaded to Git.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerts::{Alert, Notifier};
use crate::config::Config;
use crate::dns::HostResolver;
use crate::error::RunError;
use crate::fetcher::Fetcher;
use crate::git::{commit_message, GitUploader};
use crate::health::HealthSink;
use crate::hostnames::HostnameBuilder;
use crate::ips::IpBuilder;
use crate::output::OutputWriter;
use crate::sources::Category;
use crate::tasks::{BlockListTask, BuildTask, NamedRootTask, RootAnchorsTask};
use crate::trust_anchor::TrustAnchorClient;
use crate::utils::{format_bytes, format_duration};

/// The default task set: both trust anchor files and one block list task
/// per category.
pub fn default_tasks(
    config: &Config,
    fetcher: Arc<Fetcher>,
    resolver: Arc<dyn HostResolver>,
    output: OutputWriter,
) -> Vec<Arc<dyn BuildTask>> {
    let anchors = Arc::new(TrustAnchorClient::new(
        Arc::clone(&fetcher),
        &config.named_root_md5,
        &config.root_anchors_sha256,
    ));
    let hostnames = Arc::new(HostnameBuilder::new(Arc::clone(&fetcher)));
    let ips = Arc::new(IpBuilder::new(fetcher, resolver));

    let mut tasks: Vec<Arc<dyn BuildTask>> = vec![
        Arc::new(NamedRootTask::new(Arc::clone(&anchors), output.clone())) as Arc<dyn BuildTask>,
        Arc::new(RootAnchorsTask::new(anchors, output.clone())),
    ];
    for category in Category::ALL {
        tasks.push(Arc::new(BlockListTask::for_category(
            category,
            Arc::clone(&hostnames),
            Arc::clone(&ips),
            output.clone(),
            config.resolve_hostnames,
        )));
    }
    tasks
}

/// Drives update cycles.
pub struct Runner {
    tasks: Vec<Arc<dyn BuildTask>>,
    health: Arc<dyn HealthSink>,
    notifier: Arc<dyn Notifier>,
    git: Option<Arc<dyn GitUploader>>,
    fetcher: Option<Arc<Fetcher>>,
    period: Duration,
}

impl Runner {
    pub fn new(
        tasks: Vec<Arc<dyn BuildTask>>,
        health: Arc<dyn HealthSink>,
        notifier: Arc<dyn Notifier>,
        period: Duration,
    ) -> Self {
        Self {
            tasks,
            health,
            notifier,
            git: None,
            fetcher: None,
            period,
        }
    }

    /// Pull before and upload after every cycle.
    pub fn with_git(mut self, git: Arc<dyn GitUploader>) -> Self {
        self.git = Some(git);
        self
    }

    /// Log how much `fetcher` downloaded during each cycle.
    pub fn with_download_counter(mut self, fetcher: Arc<Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Run a cycle now, then one per period, until `cancel` fires.
    ///
    /// A cycle that overruns the period delays the next one; cycles never
    /// overlap.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Stopping update loop");
                    return;
                }
                _ = ticker.tick() => {}
            }
            if self.cycle(&cancel).await.is_err() {
                debug!("Cycle failed, next attempt in {}", format_duration(self.period));
            }
        }
    }

    /// One cycle with its outcome reported.
    pub async fn cycle(&self, cancel: &CancellationToken) -> Result<(), RunError> {
        let start = Instant::now();
        if let Some(fetcher) = &self.fetcher {
            fetcher.reset_counter();
        }

        let result = self.single_run(cancel).await;
        self.report(&result).await;

        let elapsed = start.elapsed();
        info!("Overall execution took {}", format_duration(elapsed));
        if let Some(fetcher) = &self.fetcher {
            info!("Downloaded {}", format_bytes(fetcher.total_downloaded() as u64));
        }
        if !cancel.is_cancelled() {
            info!("Sleeping for {}", format_duration(self.period.saturating_sub(elapsed)));
        }
        result
    }

    /// One cycle, unreported.
    pub async fn single_run(&self, cancel: &CancellationToken) -> Result<(), RunError> {
        if let Some(git) = &self.git {
            git.pull()
                .await
                .context("pulling latest changes")
                .map_err(single_error)?;
        }

        let mut set = JoinSet::new();
        for task in &self.tasks {
            let task = Arc::clone(task);
            let cancel = cancel.clone();
            set.spawn(async move {
                let name = task.name().to_string();
                let result = task.run(&cancel).await;
                (name, result)
            });
        }

        let mut messages = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => debug!("Task {} done", name),
                Ok((name, Err(e))) => {
                    debug!("Task {} failed", name);
                    messages.push(format!("{:#}", e));
                }
                Err(e) => messages.push(format!("task panicked: {}", e)),
            }
        }
        if !messages.is_empty() {
            return Err(RunError { messages });
        }

        if let Some(git) = &self.git {
            let message = commit_message(chrono::Local::now().date_naive());
            git.upload_all_changes(&message)
                .await
                .context("uploading changes")
                .map_err(single_error)?;
        }
        Ok(())
    }

    async fn report(&self, result: &Result<(), RunError>) {
        match result {
            Ok(()) => self.health.set_health_err(None),
            Err(e) => {
                let message = e.to_string();
                error!("{}", message);
                self.health.set_health_err(Some(message.clone()));

                let failures = self.notifier.send(&Alert::cycle_failed(&message)).await;
                if !failures.is_empty() {
                    warn!("{} alert destination(s) failed", failures.len());
                }
            }
        }
    }
}

fn single_error(e: anyhow::Error) -> RunError {
    RunError {
        messages: vec![format!("{:#}", e)],
    }
}
