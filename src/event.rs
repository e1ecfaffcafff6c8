//! Lifecycle event contract between the invoking environment and the flows
//!
//! The invoking environment delivers a request descriptor (a request type plus
//! a property bag) and expects exactly one terminal report back: Success or
//! Failed. The transport for that report is environment-specific and stays
//! behind [`StatusReporter`]; [`LogReporter`] is the in-process default that
//! records the outcome through the tracing layer.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

#[cfg(test)]
use mockall::automock;

use crate::{Error, Result};

/// Lifecycle phase requested by the invoking environment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    /// The resource is being created
    Create,
    /// The resource is being updated in place
    Update,
    /// The resource is being torn down
    Delete,
}

/// Request descriptor delivered by the invoking environment
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRequest<P> {
    /// Which lifecycle phase triggered this invocation
    pub request_type: RequestType,
    /// Flow-specific desired-state parameters
    pub resource_properties: P,
}

impl<P: DeserializeOwned> LifecycleRequest<P> {
    /// Decode a request from the invoking environment's raw JSON descriptor
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::invalid_request(e.to_string()))
    }
}

/// Desired peering state for a route reconciliation pass
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteProperties {
    /// Network whose route tables are converged
    pub network_id: String,
    /// Peering link the destination is reached through
    pub peering_link_id: String,
    /// Destination address range the route targets
    pub destination_cidr: String,
    /// Region the network lives in
    pub region: String,
}

/// Target cluster for a drift cleanup pass
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftProperties {
    /// Network the cluster's leaked resources belong to
    pub network_id: String,
    /// Name of the torn-down cluster
    pub cluster_name: String,
}

/// Terminal report for one invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleStatus {
    /// The pass converged (best-effort steps may have recorded failures)
    Success,
    /// The pass aborted before converging
    Failed,
}

/// Delivers the terminal status to the invoking environment
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Deliver the terminal status for the current invocation.
    ///
    /// Called exactly once per invocation, before any error is surfaced to
    /// the caller.
    async fn report(&self, status: LifecycleStatus) -> Result<()>;
}

/// Reporter that records the terminal status through the tracing layer
pub struct LogReporter;

#[async_trait]
impl StatusReporter for LogReporter {
    async fn report(&self, status: LifecycleStatus) -> Result<()> {
        match status {
            LifecycleStatus::Success => info!("invocation succeeded"),
            LifecycleStatus::Failed => error!("invocation failed"),
        }
        Ok(())
    }
}
