//! KDL configuration parsing for depot.
//!
//! This crate handles parsing of:
//! - Publisher configuration (depot.kdl)
//! - Variable interpolation

pub mod error;
pub mod publisher;
pub mod variables;

pub use error::{ConfigError, ConfigResult};
pub use publisher::{
    BuildSettings, DepotConfig, PropertySettings, PublisherSettings, load_config, parse_config,
};
pub use variables::{BuildContext, GitContext, VariableContext, VariableContextBuilder};
