//! Reconciliation flows
//!
//! Two independent flows share the same shape: list fresh state, classify or
//! filter it, converge each resource independently, and report exactly one
//! terminal status. [`routes`] converges peering routes across a network's
//! route tables; [`drift`] removes resources a torn-down cluster left behind.

mod drift;
mod routes;

pub use drift::{clean_drift, handle_drift_event, Disposition, DriftSummary, ResourceOutcome};
pub use routes::{
    classify, converge_routes, handle_route_event, remove_routes, ClassifiedTables, RouteAction,
    RoutePassSummary, RouteTableClass, TableOutcome,
};
