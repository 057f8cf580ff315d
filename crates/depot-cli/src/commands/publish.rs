//! Deployment run command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use depot_client::ArtifactoryClient;
use depot_config::DepotConfig;
use depot_core::buildinfo::BuildInfoDocument;
use depot_core::client::{ProxyConfig, PublishClient};
use depot_core::deploy::DeployDetail;
use depot_core::Error;
use depot_publisher::{
    DeploymentOrchestrator, JsonFileWriter, ModuleExtractor, RunEvent, RunFailure, RunSummary,
};
use tracing::{info, warn};

use super::ConfigArgs;

/// Stands in for a server when remote publication is off.
struct OfflineClient;

#[async_trait]
impl PublishClient for OfflineClient {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn upload(&self, detail: &DeployDetail) -> depot_core::Result<()> {
        Err(Error::Internal(format!(
            "cannot upload {}: no server configured",
            detail.artifact_path()
        )))
    }

    async fn publish_build_info(&self, _document: &BuildInfoDocument) -> depot_core::Result<()> {
        Err(Error::Internal(
            "cannot publish build info: no server configured".to_string(),
        ))
    }

    fn configure_proxy(&mut self, _proxy: &ProxyConfig) -> depot_core::Result<()> {
        Ok(())
    }

    fn close(&mut self) {}
}

fn client_for(config: &DepotConfig) -> Result<Box<dyn PublishClient>> {
    match &config.publisher.context_url {
        Some(url) => {
            let client = ArtifactoryClient::new(
                url,
                config.publisher.username.clone(),
                config.publisher.password.clone(),
            )
            .context("Failed to create publish client")?;
            Ok(Box::new(client))
        }
        None if config.remote_enabled() => {
            anyhow::bail!("publisher context-url is required for remote publication")
        }
        None => Ok(Box::new(OfflineClient)),
    }
}

fn print_event(event: RunEvent) {
    match event {
        RunEvent::StateEntered { state } => println!("▶ {state}"),
        RunEvent::ArtifactSkipped { repository, path } => {
            println!("  ⊘ {repository}/{path} (excluded)");
        }
        RunEvent::ArtifactDeployed { repository, path } => {
            println!("  ✓ {repository}/{path}");
        }
        RunEvent::Completed { .. } => {}
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n--- Run {} succeeded ---", summary.run_id);
    println!("  deployed: {}", summary.deployed);
    println!("  skipped: {}", summary.skipped);
    match &summary.exported {
        Some(path) => println!("  exported: {}", path.display()),
        None => println!("  exported: no"),
    }
    println!("  published: {}", summary.published);
    if let Some(error) = &summary.export_error {
        println!("  export failed: {error}");
    }
}

fn print_failure(failure: &RunFailure) {
    println!("\n--- Run {} failed while {} ---", failure.run_id, failure.state);
    if let Some(artifact) = &failure.in_flight {
        println!("  artifact: {artifact}");
    }
    if let Some(step) = &failure.step {
        println!("  step: {step}");
    }
    println!("  error: {}", failure.error);
    println!("  uploaded before failure: {}", failure.uploaded);
    let visited: Vec<String> = failure.visited.iter().map(|s| s.to_string()).collect();
    println!("  states: {}", visited.join(" → "));
}

/// Run a full deployment for the artifacts listed in `manifest_path`.
pub async fn run(
    args: &ConfigArgs,
    manifest_path: &Path,
    dry_run: bool,
) -> Result<()> {
    let mut config = super::load(args)?;
    if dry_run {
        config.disable_remote();
        info!("Dry run, remote publication disabled");
    }
    let inputs = super::read_manifest(manifest_path)?;
    let client = client_for(&config)?;

    println!(
        "Publishing build {} #{} ({} artifacts, {} descriptors)",
        config.build.name,
        config.build.number,
        inputs.artifacts.len(),
        inputs.descriptors.len()
    );

    let mut orchestrator =
        DeploymentOrchestrator::new(Arc::new(ModuleExtractor), Arc::new(JsonFileWriter));
    let mut events = orchestrator.events();

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(event);
        }
    });

    let result = orchestrator.run(&config, inputs, client).await;
    // Closes the event channel so the printer drains and exits.
    drop(orchestrator);
    printer.await.context("Event printer task failed")?;

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(failure) => {
            print_failure(&failure);
            Err(anyhow::Error::new(failure))
        }
    }
}
