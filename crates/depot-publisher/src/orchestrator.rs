//! Deployment orchestrator - resolves, filters and uploads artifacts, then
//! extracts, exports and publishes the build-info document.
//!
//! A run moves through
//! `Collecting -> Filtering -> Uploading -> ExtractingInfo -> ExportingInfo -> PublishingInfo -> Done`
//! and may end in `Failed` from any of them. Uploading and PublishingInfo are
//! skipped when the matching publish flag is off. The publish client is closed
//! exactly once when the run ends, however it ends.
//!
//! Cancellation and the run deadline are only observed between dispatches. A
//! remote call that has started is left to finish, bounded by the per-call
//! io timeout.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use depot_config::DepotConfig;
use depot_core::client::{BuildInfoExtractor, DocumentWriter, PublishClient};
use depot_core::deploy::{DeployDetail, DeploySet};
use depot_core::filter::IncludeExcludePatterns;
use depot_core::{Error, RunId};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::builder::{BuildStep, DeployDetailBuilder};
use crate::collect::{self, CollectError, PublishInputs};

/// Delay before the first retry; doubled for each further attempt.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// State of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Collecting,
    Filtering,
    Uploading,
    ExtractingInfo,
    ExportingInfo,
    PublishingInfo,
    Done,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Event emitted during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    StateEntered { state: RunState },
    ArtifactSkipped { repository: String, path: String },
    ArtifactDeployed { repository: String, path: String },
    Completed { success: bool },
}

/// Report of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub deployed: usize,
    pub skipped: usize,
    /// Where the document was exported, if it was.
    pub exported: Option<PathBuf>,
    pub published: bool,
    /// Export failure tolerated because the document was published remotely.
    pub export_error: Option<String>,
    pub visited: Vec<RunState>,
}

/// Report of a failed run.
#[derive(Debug, Error)]
#[error("run {run_id} failed while {state}: {error}")]
pub struct RunFailure {
    pub run_id: RunId,
    /// The state the run was in when it failed.
    pub state: RunState,
    /// Artifact being processed when the run failed.
    pub in_flight: Option<String>,
    /// Detail construction step that failed, for failures while collecting.
    pub step: Option<BuildStep>,
    #[source]
    pub error: Error,
    /// Artifacts uploaded before the failure. They are not rolled back.
    pub uploaded: usize,
    pub visited: Vec<RunState>,
}

/// The result of collecting and filtering without publishing anything.
#[derive(Debug)]
pub struct Plan {
    pub run_id: RunId,
    pub deploy: DeploySet,
    pub skipped: Vec<DeployDetail>,
}

/// Owns the publish client for one run and closes it on drop.
struct ClientGuard {
    client: Box<dyn PublishClient>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.client.close();
    }
}

/// Mutable bookkeeping of one run.
struct Progress {
    run_id: RunId,
    state: RunState,
    visited: Vec<RunState>,
    in_flight: Option<String>,
    step: Option<BuildStep>,
    uploaded: usize,
    events: Option<mpsc::Sender<RunEvent>>,
    cancel: CancellationToken,
    budget: Duration,
    deadline: Instant,
}

impl Progress {
    fn new(
        events: Option<mpsc::Sender<RunEvent>>,
        cancel: CancellationToken,
        budget: Duration,
    ) -> Self {
        Self {
            run_id: RunId::new(),
            state: RunState::Collecting,
            visited: Vec::new(),
            in_flight: None,
            step: None,
            uploaded: 0,
            events,
            cancel,
            budget,
            deadline: Instant::now() + budget,
        }
    }

    async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    async fn enter(&mut self, state: RunState) {
        info!(run_id = %self.run_id, %state, "Entering state");
        self.state = state;
        self.visited.push(state);
        self.emit(RunEvent::StateEntered { state }).await;
    }

    /// Fails when the run was cancelled or its deadline has passed.
    fn checkpoint(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(Error::Timeout(format!("run exceeded {:?}", self.budget)));
        }
        Ok(())
    }

    async fn fail(mut self, error: Error) -> RunFailure {
        let state = self.state;
        error!(
            run_id = %self.run_id,
            %state,
            in_flight = ?self.in_flight,
            uploaded = self.uploaded,
            kind = error.kind(),
            error = %error,
            "Run failed"
        );
        self.enter(RunState::Failed).await;
        self.emit(RunEvent::Completed { success: false }).await;
        RunFailure {
            run_id: self.run_id,
            state,
            in_flight: self.in_flight,
            step: self.step,
            error,
            uploaded: self.uploaded,
            visited: self.visited,
        }
    }
}

/// Sequences a deployment run.
pub struct DeploymentOrchestrator {
    extractor: Arc<dyn BuildInfoExtractor>,
    writer: Arc<dyn DocumentWriter>,
    events_tx: Option<mpsc::Sender<RunEvent>>,
    /// Token of the current or next run.
    cancel: Mutex<CancellationToken>,
}

impl DeploymentOrchestrator {
    pub fn new(extractor: Arc<dyn BuildInfoExtractor>, writer: Arc<dyn DocumentWriter>) -> Self {
        Self {
            extractor,
            writer,
            events_tx: None,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Subscribe to run events. The receiver must be drained while a run is active.
    pub fn events(&mut self) -> mpsc::Receiver<RunEvent> {
        let (tx, rx) = mpsc::channel(256);
        self.events_tx = Some(tx);
        rx
    }

    /// Returns the token that cancels the current run, or the next one if none
    /// is active. Once a cancelled run ends, later runs get a fresh token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn start_run(&self, config: &DepotConfig) -> Progress {
        Progress::new(
            self.events_tx.clone(),
            self.cancel_token(),
            config.publisher.timeout,
        )
    }

    fn end_run(&self, progress: &Progress) {
        if !progress.cancel.is_cancelled() {
            return;
        }
        let mut current = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
    }

    /// Collect and filter without touching the remote side.
    pub async fn plan(
        &self,
        config: &DepotConfig,
        inputs: PublishInputs,
    ) -> Result<Plan, RunFailure> {
        let mut progress = self.start_run(config);
        progress.enter(RunState::Collecting).await;
        let outcome = self.collect_and_filter(config, inputs, &mut progress).await;
        self.end_run(&progress);
        match outcome {
            Ok((deploy, skipped)) => Ok(Plan {
                run_id: progress.run_id,
                deploy,
                skipped,
            }),
            Err(error) => Err(progress.fail(error).await),
        }
    }

    /// Run the full deployment. `client` is closed before this returns.
    pub async fn run(
        &self,
        config: &DepotConfig,
        inputs: PublishInputs,
        client: Box<dyn PublishClient>,
    ) -> Result<RunSummary, RunFailure> {
        let mut guard = ClientGuard { client };
        let mut progress = self.start_run(config);

        info!(
            run_id = %progress.run_id,
            client = guard.client.name(),
            build = %config.build.name,
            number = %config.build.number,
            "Starting deployment run"
        );

        let outcome = self.drive(config, inputs, &mut guard, &mut progress).await;
        drop(guard);
        self.end_run(&progress);

        match outcome {
            Ok(summary) => {
                progress.emit(RunEvent::Completed { success: true }).await;
                info!(
                    run_id = %summary.run_id,
                    deployed = summary.deployed,
                    skipped = summary.skipped,
                    exported = ?summary.exported,
                    published = summary.published,
                    "Deployment run completed"
                );
                Ok(summary)
            }
            Err(error) => Err(progress.fail(error).await),
        }
    }

    async fn drive(
        &self,
        config: &DepotConfig,
        inputs: PublishInputs,
        guard: &mut ClientGuard,
        progress: &mut Progress,
    ) -> Result<RunSummary, Error> {
        let publisher = &config.publisher;

        progress.enter(RunState::Collecting).await;
        if config.remote_enabled() {
            if let Some(proxy) = &config.proxy {
                info!(host = %proxy.host, port = proxy.port, "Configuring proxy");
                guard.client.configure_proxy(proxy)?;
            }
        }

        let (deploy, skipped) = self.collect_and_filter(config, inputs, progress).await?;
        let client = &*guard.client;

        if publisher.publish_artifacts {
            progress.enter(RunState::Uploading).await;
            for detail in &deploy {
                progress.checkpoint()?;
                progress.in_flight = Some(detail.key().to_string());
                info!(
                    run_id = %progress.run_id,
                    repository = %detail.target_repository(),
                    path = %detail.artifact_path(),
                    "Deploying artifact"
                );
                with_retries(
                    publisher.retries,
                    publisher.io_timeout,
                    &progress.cancel,
                    "upload",
                    || client.upload(detail),
                )
                .await?;
                progress.uploaded += 1;
                progress.in_flight = None;
                progress
                    .emit(RunEvent::ArtifactDeployed {
                        repository: detail.target_repository().to_string(),
                        path: detail.artifact_path().to_string(),
                    })
                    .await;
            }
        } else {
            info!(run_id = %progress.run_id, "Artifact publication disabled");
        }
        // The document must only describe a run that was not cancelled mid-upload.
        progress.checkpoint()?;

        progress.enter(RunState::ExtractingInfo).await;
        let document = self.extractor.extract(&deploy, &config.build_metadata())?;

        progress.enter(RunState::ExportingInfo).await;
        let export_path = config.export_path.clone();
        let writer = self.writer.clone();
        let exported = {
            let document = document.clone();
            let path = export_path.clone();
            let task = tokio::task::spawn_blocking(move || writer.write_document(&document, &path));
            match task.await {
                Ok(result) => result,
                Err(join) => Err(Error::Internal(format!("export task failed: {join}"))),
            }
        };
        let export_error = match exported {
            Ok(()) => {
                info!(path = %export_path.display(), "Exported build info");
                None
            }
            Err(e) if publisher.publish_build_info => {
                warn!(path = %export_path.display(), error = %e, "Build info export failed; publishing remotely");
                Some(e.to_string())
            }
            Err(e) => return Err(e),
        };

        if publisher.publish_build_info {
            progress.checkpoint()?;
            progress.enter(RunState::PublishingInfo).await;
            info!(
                run_id = %progress.run_id,
                modules = document.modules.len(),
                artifacts = document.artifact_count(),
                "Publishing build info"
            );
            with_retries(
                publisher.retries,
                publisher.io_timeout,
                &progress.cancel,
                "build info",
                || client.publish_build_info(&document),
            )
            .await?;
        }

        progress.enter(RunState::Done).await;
        Ok(RunSummary {
            run_id: progress.run_id,
            deployed: progress.uploaded,
            skipped: skipped.len(),
            exported: export_error.is_none().then_some(export_path),
            published: publisher.publish_build_info,
            export_error,
            visited: progress.visited.clone(),
        })
    }

    /// Runs the Collecting work (the state is entered by the caller) and Filtering.
    async fn collect_and_filter(
        &self,
        config: &DepotConfig,
        inputs: PublishInputs,
        progress: &mut Progress,
    ) -> Result<(DeploySet, Vec<DeployDetail>), Error> {
        let publisher = &config.publisher;

        let mut builder =
            DeployDetailBuilder::new(Arc::new(config.property_resolver()), publisher.m2_compatible)
                .with_algorithms(&publisher.checksums);
        for (token, value) in &publisher.layout_tokens {
            builder = builder.with_extra_token(token.clone(), value.clone());
        }
        let items = collect::plan_work(inputs, publisher);
        let cancel = progress.cancel.clone();
        let set = collect::collect(
            items,
            builder,
            publisher.concurrency,
            publisher.io_timeout,
            &cancel,
        )
        .await
        .map_err(|e| match e {
            CollectError::Detail(detail) => {
                progress.in_flight = Some(detail.artifact);
                progress.step = Some(detail.step);
                detail.source
            }
            CollectError::Other(error) => error,
        })?;
        info!(run_id = %progress.run_id, details = set.len(), "Collected deploy details");

        progress.enter(RunState::Filtering).await;
        let (deploy, skipped) = partition(set, &publisher.patterns)?;
        for detail in &skipped {
            info!(
                path = %detail.artifact_path(),
                "Skipping the deployment of artifact due to the defined include/exclude patterns"
            );
            progress
                .emit(RunEvent::ArtifactSkipped {
                    repository: detail.target_repository().to_string(),
                    path: detail.artifact_path().to_string(),
                })
                .await;
        }
        Ok((deploy, skipped))
    }
}

/// Run `op` with a per-call timeout, retrying retryable failures.
async fn with_retries<F, Fut>(
    retries: u32,
    io_timeout: Duration,
    cancel: &CancellationToken,
    what: &str,
    mut op: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), Error>>,
{
    let mut attempt = 0;
    loop {
        let result = tokio::time::timeout(io_timeout, op())
            .await
            .unwrap_or_else(|_| Err(Error::Timeout(format!("{what} exceeded {io_timeout:?}"))));
        match result {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                let delay = RETRY_BACKOFF * 2u32.saturating_pow(attempt - 1);
                warn!(attempt, retries, error = %e, ?delay, "Retrying {what}");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Split a deploy set into eligible and skipped details.
fn partition(
    set: DeploySet,
    patterns: &IncludeExcludePatterns,
) -> Result<(DeploySet, Vec<DeployDetail>), Error> {
    let mut eligible = DeploySet::new();
    let mut skipped = Vec::new();
    for detail in set {
        if patterns.eligible(detail.artifact_path()) {
            eligible.insert(detail)?;
        } else {
            skipped.push(detail);
        }
    }
    Ok((eligible, skipped))
}
