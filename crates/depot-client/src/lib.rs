//! HTTP publish client for depot.
//!
//! Talks to an Artifactory-style REST API: artifacts are uploaded with `PUT`
//! and matrix parameters, build info is published to `api/build`.

pub mod artifactory;

pub use artifactory::ArtifactoryClient;
