//! Deploy detail resolution and publication for depot.
//!
//! Turns produced files into deploy details, filters them, uploads them and
//! publishes the build-info document describing what was deployed.

pub mod builder;
pub mod collect;
pub mod export;
pub mod extractor;
pub mod orchestrator;

pub use builder::{BuildStep, DeployDetailBuilder, DetailError};
pub use collect::{ArtifactInput, DescriptorInput, DescriptorKind, PublishInputs};
pub use export::JsonFileWriter;
pub use extractor::ModuleExtractor;
pub use orchestrator::{
    DeploymentOrchestrator, Plan, RunEvent, RunFailure, RunState, RunSummary,
};
