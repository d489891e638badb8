//! Configuration module for the provisioner.
//!
//! This module handles all configuration-related functionality:
//! - Parsing multi-document YAML deployment specification files
//! - Validating raw records into deployment descriptors
//! - Loading endpoint maps and `.env` files

mod spec;
mod parser;
mod validator;

pub use spec::{
    CONFIG_VERSION, DeploymentDescriptor, Placement, RawDeployment, RawTeam, ResourceType,
    TeamRole,
};
pub use parser::ConfigParser;
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
