//! Drifted resource cleanup
//!
//! An orchestrated cluster's control plane creates network interfaces and
//! security groups carrying a predictable group-name prefix. When the cluster
//! is torn down, some of those can outlive it. This flow scans the network
//! for them on the delete lifecycle event and removes them best-effort: the
//! full deletion plan is logged up front, each deletion is attempted
//! independently, and failures never block the remaining resources.

use tracing::{debug, error, info, instrument, warn};

use crate::client::NetworkClient;
use crate::event::{
    DriftProperties, LifecycleRequest, LifecycleStatus, RequestType, StatusReporter,
};
use crate::model::{NetworkInterface, SecurityGroup};
use crate::paginate::collect_all;
use crate::{Result, DRIFT_GROUP_PREFIX};

/// Group-name prefix marking resources created for the named cluster
fn drift_prefix(cluster_name: &str) -> String {
    format!("{DRIFT_GROUP_PREFIX}{cluster_name}")
}

/// How one drifted resource's deletion went
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// The resource was deleted
    Deleted,
    /// The delete call failed; cleanup continued
    Failed(String),
}

/// Per-resource record from a cleanup pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceOutcome {
    /// Identifier of the resource the attempt targeted
    pub id: String,
    /// What happened
    pub disposition: Disposition,
}

/// Everything one cleanup pass discovered and attempted, in discovery order
#[derive(Clone, Debug, Default)]
pub struct DriftSummary {
    /// Drifted network interfaces
    pub interfaces: Vec<ResourceOutcome>,
    /// Drifted security groups
    pub groups: Vec<ResourceOutcome>,
}

impl DriftSummary {
    /// Ids of resources whose deletion failed
    pub fn failures(&self) -> Vec<&str> {
        self.interfaces
            .iter()
            .chain(self.groups.iter())
            .filter(|outcome| matches!(outcome.disposition, Disposition::Failed(_)))
            .map(|outcome| outcome.id.as_str())
            .collect()
    }
}

/// Scan every network interface and keep the drifted ones: owned by the
/// target network, with at least one attached group carrying the prefix.
///
/// The service offers no network filter on this listing, so membership is
/// checked here.
async fn discover_drifted_interfaces(
    client: &dyn NetworkClient,
    network_id: &str,
    prefix: &str,
) -> Result<Vec<NetworkInterface>> {
    let interfaces = collect_all(|cursor| client.list_network_interfaces(cursor)).await?;
    debug!(count = interfaces.len(), "scanned network interfaces");

    Ok(interfaces
        .into_iter()
        .filter(|interface| {
            interface.network == network_id
                && interface
                    .group_names
                    .iter()
                    .any(|name| name.starts_with(prefix))
        })
        .collect())
}

/// Scan the network's security groups and keep those whose own name carries
/// the prefix
async fn discover_drifted_groups(
    client: &dyn NetworkClient,
    network_id: &str,
    prefix: &str,
) -> Result<Vec<SecurityGroup>> {
    let groups = collect_all(|cursor| client.list_security_groups(network_id, cursor)).await?;
    debug!(count = groups.len(), "scanned security groups");

    Ok(groups
        .into_iter()
        .filter(|group| group.network == network_id && group.name.starts_with(prefix))
        .collect())
}

/// Remove everything the torn-down cluster left behind in the network.
///
/// Interfaces go first: a group still attached to an interface cannot be
/// deleted. Discovery failures abort the pass; per-resource deletion
/// failures are recorded and skipped over.
#[instrument(skip(client, props), fields(network = %props.network_id, cluster = %props.cluster_name))]
pub async fn clean_drift(
    client: &dyn NetworkClient,
    props: &DriftProperties,
) -> Result<DriftSummary> {
    let prefix = drift_prefix(&props.cluster_name);
    let mut summary = DriftSummary::default();

    let interfaces = discover_drifted_interfaces(client, &props.network_id, &prefix).await?;
    let planned: Vec<&str> = interfaces.iter().map(|i| i.id.as_str()).collect();
    info!(interfaces = ?planned, "planning to delete drifted network interfaces");

    for interface in &interfaces {
        let disposition = match client.delete_network_interface(&interface.id).await {
            Ok(()) => {
                info!(interface = %interface.id, "deleted drifted network interface");
                Disposition::Deleted
            }
            Err(err) => {
                warn!(
                    interface = %interface.id,
                    error = %err,
                    "failed to delete network interface, continuing"
                );
                Disposition::Failed(err.to_string())
            }
        };
        summary.interfaces.push(ResourceOutcome {
            id: interface.id.clone(),
            disposition,
        });
    }

    let groups = discover_drifted_groups(client, &props.network_id, &prefix).await?;
    let planned: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
    info!(groups = ?planned, "planning to delete drifted security groups");

    for group in &groups {
        let disposition = match client.delete_security_group(&group.id).await {
            Ok(()) => {
                info!(group = %group.id, "deleted drifted security group");
                Disposition::Deleted
            }
            Err(err) => {
                warn!(
                    group = %group.id,
                    error = %err,
                    "failed to delete security group, continuing"
                );
                Disposition::Failed(err.to_string())
            }
        };
        summary.groups.push(ResourceOutcome {
            id: group.id.clone(),
            disposition,
        });
    }

    Ok(summary)
}

/// Clean up cluster drift for one lifecycle event.
///
/// Only teardown triggers a scan; create and update report Success
/// immediately. Exactly one terminal status is delivered per invocation, and
/// on fatal error the Failed report goes out before the error is returned to
/// the caller.
#[instrument(
    skip(client, reporter, request),
    fields(
        network = %request.resource_properties.network_id,
        cluster = %request.resource_properties.cluster_name,
        request = ?request.request_type,
    )
)]
pub async fn handle_drift_event(
    client: &dyn NetworkClient,
    reporter: &dyn StatusReporter,
    request: &LifecycleRequest<DriftProperties>,
) -> Result<DriftSummary> {
    if request.request_type != RequestType::Delete {
        debug!("nothing to clean up for this request type");
        reporter.report(LifecycleStatus::Success).await?;
        return Ok(DriftSummary::default());
    }

    match clean_drift(client, &request.resource_properties).await {
        Ok(summary) => {
            reporter.report(LifecycleStatus::Success).await?;
            Ok(summary)
        }
        Err(err) => {
            error!(error = %err, "drift cleanup failed");
            if let Err(report_err) = reporter.report(LifecycleStatus::Failed).await {
                warn!(error = %report_err, "failed to deliver terminal status");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockNetworkClient;
    use crate::error::Error;
    use crate::event::MockStatusReporter;
    use crate::paginate::Page;

    fn interface(id: &str, network: &str, group_names: &[&str]) -> NetworkInterface {
        NetworkInterface {
            id: id.to_string(),
            network: network.to_string(),
            group_names: group_names.iter().map(|n| n.to_string()).collect(),
        }
    }

    fn group(id: &str, network: &str, name: &str) -> SecurityGroup {
        SecurityGroup {
            id: id.to_string(),
            network: network.to_string(),
            name: name.to_string(),
        }
    }

    fn props() -> DriftProperties {
        DriftProperties {
            network_id: "net-1".to_string(),
            cluster_name: "payments".to_string(),
        }
    }

    fn last_page<T>(items: Vec<T>) -> Page<T> {
        Page { items, next: None }
    }

    fn no_groups(client: &mut MockNetworkClient) {
        client
            .expect_list_security_groups()
            .returning(|_, _| Ok(last_page(Vec::new())));
    }

    fn no_interfaces(client: &mut MockNetworkClient) {
        client
            .expect_list_network_interfaces()
            .returning(|_| Ok(last_page(Vec::new())));
    }

    fn delete_request() -> LifecycleRequest<DriftProperties> {
        LifecycleRequest {
            request_type: RequestType::Delete,
            resource_properties: props(),
        }
    }

    fn success_reporter() -> MockStatusReporter {
        let mut reporter = MockStatusReporter::new();
        reporter
            .expect_report()
            .withf(|status| *status == LifecycleStatus::Success)
            .times(1)
            .returning(|_| Ok(()));
        reporter
    }

    mod filtering {
        use super::*;

        /// Interfaces and groups from two networks and two clusters: only
        /// those matching both the target network and the target cluster's
        /// prefix are selected.
        #[tokio::test]
        async fn only_the_target_network_and_cluster_match() {
            let mut client = MockNetworkClient::new();
            client.expect_list_network_interfaces().returning(|_| {
                Ok(last_page(vec![
                    interface("eni-match", "net-1", &["eks-cluster-sg-payments-1a2b"]),
                    interface("eni-other-net", "net-2", &["eks-cluster-sg-payments-1a2b"]),
                    interface("eni-other-cluster", "net-1", &["eks-cluster-sg-billing-9f8e"]),
                    interface("eni-unrelated", "net-1", &["default"]),
                ]))
            });
            client.expect_list_security_groups().returning(|network, _| {
                assert_eq!(network, "net-1");
                Ok(last_page(vec![
                    group("sg-match", "net-1", "eks-cluster-sg-payments-1a2b"),
                    group("sg-other-cluster", "net-1", "eks-cluster-sg-billing-9f8e"),
                    group("sg-unrelated", "net-1", "default"),
                ]))
            });
            client
                .expect_delete_network_interface()
                .withf(|id| id == "eni-match")
                .times(1)
                .returning(|_| Ok(()));
            client
                .expect_delete_security_group()
                .withf(|id| id == "sg-match")
                .times(1)
                .returning(|_| Ok(()));

            let summary = clean_drift(&client, &props()).await.unwrap();

            assert_eq!(summary.interfaces.len(), 1);
            assert_eq!(summary.interfaces[0].id, "eni-match");
            assert_eq!(summary.groups.len(), 1);
            assert_eq!(summary.groups[0].id, "sg-match");
            assert!(summary.failures().is_empty());
        }

        #[tokio::test]
        async fn an_interface_matches_through_any_attached_group() {
            let mut client = MockNetworkClient::new();
            client.expect_list_network_interfaces().returning(|_| {
                Ok(last_page(vec![interface(
                    "eni-1",
                    "net-1",
                    &["default", "eks-cluster-sg-payments-1a2b"],
                )]))
            });
            no_groups(&mut client);
            client
                .expect_delete_network_interface()
                .times(1)
                .returning(|_| Ok(()));

            let summary = clean_drift(&client, &props()).await.unwrap();
            assert_eq!(summary.interfaces.len(), 1);
        }

        #[tokio::test]
        async fn discovery_pages_are_all_scanned() {
            let mut client = MockNetworkClient::new();
            client
                .expect_list_network_interfaces()
                .times(2)
                .returning(|cursor| {
                    let page = match cursor.as_deref() {
                        None => Page {
                            items: vec![interface(
                                "eni-1",
                                "net-1",
                                &["eks-cluster-sg-payments-1a2b"],
                            )],
                            next: Some("p2".to_string()),
                        },
                        Some("p2") => last_page(vec![interface(
                            "eni-2",
                            "net-1",
                            &["eks-cluster-sg-payments-3c4d"],
                        )]),
                        Some(other) => panic!("unexpected cursor {other}"),
                    };
                    Ok(page)
                });
            no_groups(&mut client);
            client
                .expect_delete_network_interface()
                .times(2)
                .returning(|_| Ok(()));

            let summary = clean_drift(&client, &props()).await.unwrap();
            assert_eq!(summary.interfaces.len(), 2);
        }
    }

    mod best_effort {
        use super::*;

        /// One failing deletion out of three: the other two still go through
        /// and the invocation still reports Success.
        #[tokio::test]
        async fn a_failed_deletion_does_not_block_the_rest() {
            let mut client = MockNetworkClient::new();
            client.expect_list_network_interfaces().returning(|_| {
                Ok(last_page(vec![
                    interface("eni-1", "net-1", &["eks-cluster-sg-payments-a"]),
                    interface("eni-2", "net-1", &["eks-cluster-sg-payments-b"]),
                    interface("eni-3", "net-1", &["eks-cluster-sg-payments-c"]),
                ]))
            });
            no_groups(&mut client);
            client
                .expect_delete_network_interface()
                .times(3)
                .returning(|id| {
                    if id == "eni-2" {
                        Err(Error::service_with_code("InvalidParameterValue", "in use"))
                    } else {
                        Ok(())
                    }
                });

            let summary = handle_drift_event(&client, &success_reporter(), &delete_request())
                .await
                .unwrap();

            assert_eq!(summary.interfaces[0].disposition, Disposition::Deleted);
            assert!(matches!(
                summary.interfaces[1].disposition,
                Disposition::Failed(_)
            ));
            assert_eq!(summary.interfaces[2].disposition, Disposition::Deleted);
            assert_eq!(summary.failures(), vec!["eni-2"]);
        }

        #[tokio::test]
        async fn group_failures_are_isolated_too() {
            let mut client = MockNetworkClient::new();
            no_interfaces(&mut client);
            client.expect_list_security_groups().returning(|_, _| {
                Ok(last_page(vec![
                    group("sg-1", "net-1", "eks-cluster-sg-payments-a"),
                    group("sg-2", "net-1", "eks-cluster-sg-payments-b"),
                ]))
            });
            client
                .expect_delete_security_group()
                .times(2)
                .returning(|id| {
                    if id == "sg-1" {
                        Err(Error::service_with_code("DependencyViolation", "attached"))
                    } else {
                        Ok(())
                    }
                });

            let summary = handle_drift_event(&client, &success_reporter(), &delete_request())
                .await
                .unwrap();

            assert_eq!(summary.failures(), vec!["sg-1"]);
            assert_eq!(summary.groups[1].disposition, Disposition::Deleted);
        }
    }

    mod handler {
        use super::*;

        #[tokio::test]
        async fn create_and_update_report_success_without_scanning() {
            for request_type in [RequestType::Create, RequestType::Update] {
                // No expectations: any service call would panic the mock
                let client = MockNetworkClient::new();

                let request = LifecycleRequest {
                    request_type,
                    resource_properties: props(),
                };
                let summary = handle_drift_event(&client, &success_reporter(), &request)
                    .await
                    .unwrap();

                assert!(summary.interfaces.is_empty());
                assert!(summary.groups.is_empty());
            }
        }

        #[tokio::test]
        async fn discovery_failure_reports_failed_then_surfaces() {
            let mut client = MockNetworkClient::new();
            client
                .expect_list_network_interfaces()
                .returning(|_| Err(Error::service("scan denied")));

            let mut reporter = MockStatusReporter::new();
            reporter
                .expect_report()
                .withf(|status| *status == LifecycleStatus::Failed)
                .times(1)
                .returning(|_| Ok(()));

            let err = handle_drift_event(&client, &reporter, &delete_request())
                .await
                .unwrap_err();

            assert!(err.to_string().contains("scan denied"));
        }
    }
}
