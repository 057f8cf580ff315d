//! Core domain types and algorithms for depot.
//!
//! This crate contains:
//! - Artifact identities and wildcard property specs
//! - Checksum calculation
//! - Repository path layouts (Ivy-style patterns)
//! - Property resolution
//! - Include/exclude path filtering
//! - Deploy details and the deploy set
//! - The build-info document model
//! - Collaborator traits (publish client, extractor, document writer)

pub mod buildinfo;
pub mod checksum;
pub mod client;
pub mod deploy;
pub mod error;
pub mod filter;
pub mod id;
pub mod identity;
pub mod layout;
pub mod properties;

pub use error::{Error, Result};
pub use id::RunId;
