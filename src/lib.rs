//! Culvert - reconciliation core for cloud workload networking
//!
//! Culvert keeps a network's routing state and leftover cluster resources
//! converged with a desired peering configuration. An external caller invokes
//! one of two flows with a lifecycle request (create, update, or delete) and a
//! property bag; the flow re-lists state from the networking service,
//! converges it, and delivers exactly one terminal Success/Failed report.
//!
//! Both flows share the same shape: list everything fresh, classify or filter
//! it, converge each resource independently, and report. No state is carried
//! between invocations, so a partially completed pass is safe to retry.
//!
//! # Flows
//!
//! - Route reconciliation ([`reconcile::handle_route_event`]) classifies every
//!   route table in a network and ensures (or removes) a route to a peering
//!   destination on each eligible one.
//! - Drift cleanup ([`reconcile::handle_drift_event`]) finds network
//!   interfaces and security groups a torn-down cluster's control plane left
//!   behind and deletes them best-effort.
//!
//! # Modules
//!
//! - [`event`] - Lifecycle request/response contract and status reporting
//! - [`model`] - Domain records read fresh from the networking service
//! - [`client`] - Networking service abstraction and the EC2-backed client
//! - [`paginate`] - Cursor-chained pagination shared by every listing
//! - [`reconcile`] - The two reconciliation flows
//! - [`error`] - Error types for the reconciliation core

#![deny(missing_docs)]

pub mod client;
pub mod error;
pub mod event;
pub mod model;
pub mod paginate;
pub mod reconcile;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Classification Constants
// =============================================================================
// These literals drive route-table classification and drift detection.
// Centralizing them here keeps the reconcilers and test fixtures consistent.

/// Destination block of a default route
pub const DEFAULT_ROUTE_CIDR: &str = "0.0.0.0/0";

/// Identifier prefix the networking service assigns to internet gateways
pub const INTERNET_GATEWAY_PREFIX: &str = "igw";

/// Base of the group-name prefix an orchestrated cluster's control plane
/// stamps on the resources it creates; the cluster name is appended to it
pub const DRIFT_GROUP_PREFIX: &str = "eks-cluster-sg-";
