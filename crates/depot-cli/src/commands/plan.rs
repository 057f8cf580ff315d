//! Dry planning command: collect and filter, print what would happen.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use depot_core::deploy::DeployDetail;
use depot_publisher::{DeploymentOrchestrator, JsonFileWriter, ModuleExtractor};

use super::ConfigArgs;

fn print_detail(detail: &DeployDetail, marker: &str) {
    println!(
        "{marker} {}/{}",
        detail.target_repository(),
        detail.artifact_path()
    );
    println!("    source: {}", detail.source_file().display());
    for (algorithm, digest) in detail.checksums().iter() {
        println!("    {algorithm}: {digest}");
    }
    for (key, value) in detail.properties() {
        println!("    {key} = {value}");
    }
}

pub async fn run(args: &ConfigArgs, manifest_path: &Path) -> Result<()> {
    let config = super::load(args)?;
    let inputs = super::read_manifest(manifest_path)?;

    let orchestrator =
        DeploymentOrchestrator::new(Arc::new(ModuleExtractor), Arc::new(JsonFileWriter));
    let plan = match orchestrator.plan(&config, inputs).await {
        Ok(plan) => plan,
        Err(failure) => {
            println!("Planning failed while {}: {}", failure.state, failure.error);
            if let Some(artifact) = &failure.in_flight {
                println!("  artifact: {artifact}");
            }
            return Err(anyhow::Error::new(failure));
        }
    };

    println!(
        "Build {} #{}: {} to deploy, {} skipped",
        config.build.name,
        config.build.number,
        plan.deploy.len(),
        plan.skipped.len()
    );
    for detail in &plan.deploy {
        print_detail(detail, "✓");
    }
    for detail in &plan.skipped {
        print_detail(detail, "⊘");
    }
    if !config.publisher.publish_artifacts {
        println!("Artifact publication is disabled");
    }
    Ok(())
}
