// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # dbaas provisioner
//!
//! Concurrent, idempotent provisioning of hosted database deployments from
//! declarative YAML specs.
//!
//! ## Overview
//!
//! Given N requested deployments, the provisioner:
//!
//! - Fetches the account inventory once (clusters, datacenters, deployments)
//! - Validates every spec before any remote work starts
//! - Runs one task per deployment, creating or updating only what differs
//! - Waits for each remote job to converge, then applies tags and team roles
//! - Reports every failure by deployment and stage without stopping siblings
//!
//! ## Modules
//!
//! - [`config`]: Spec parsing and validation
//! - [`dbaas`]: API trait, HTTP client and wire types
//! - [`inventory`]: Account snapshot taken at startup
//! - [`provision`]: Deployers, orchestration, error aggregation and output
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! config_version: 1
//! type: redis
//! name: cache1
//! datacenter: aws:us-east-1
//! scaling: 2
//! tags: [cache, prod]
//! teams:
//!   - id: 5854017e89d50f424e000192
//!     role: developer
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod dbaas;
pub mod error;
pub mod inventory;
pub mod provision;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DeploymentDescriptor, RawDeployment};
pub use dbaas::{DbaasClient, DeploymentApi};
pub use error::{ProvisionerError, Result};
pub use inventory::Inventory;
pub use provision::{ProvisionOptions, Provisioner, Registry};
