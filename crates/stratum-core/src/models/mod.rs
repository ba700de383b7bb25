//! Data models for plans and deployments.
//!
//! This module contains the core domain models of the deployment lifecycle.
//! Display implementations for these models are located in
//! [`crate::display::models`] to keep presentation apart from the data.
//!
//! - [`Plan`]: a versioned bundle of Terraform source addressed by a storage
//!   prefix
//! - [`Deployment`]: one apply or destroy attempt against a plan
//! - [`DeploymentStatus`]: the deployment state machine (terminal statuses,
//!   legal transitions)
//!
//! # Examples
//!
//! ```rust
//! use stratum_core::models::{DeploymentStatus, Operation};
//!
//! let status = DeploymentStatus::Running;
//! assert!(status.can_transition_to(Operation::Apply.success_status(), Operation::Apply));
//! assert!(!status.can_transition_to(DeploymentStatus::Destroyed, Operation::Apply));
//! assert!(Operation::Destroy.failure_status().is_terminal());
//! ```

pub mod deployment;
pub mod filters;
pub mod plan;
pub mod status;


pub use deployment::{Completion, Deployment};
pub use filters::DeploymentFilter;
pub use plan::{Plan, PlanRevision};
pub use status::{DeploymentStatus, Operation, PlanStatus, IN_FLIGHT_STATUSES};
