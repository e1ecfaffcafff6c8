//! Peering-route reconciliation
//!
//! Converges every eligible route table in a network toward a desired peering
//! configuration: on create and update each table ends up with exactly one
//! route to the destination bound to the peering link; on delete that route
//! is removed. Tables carrying the network's main association are never
//! touched. Each pass lists the tables fresh, classifies them, and converges
//! them one by one, so a retried pass picks up wherever the last one stopped.

use tracing::{debug, error, info, instrument, warn};

use crate::client::NetworkClient;
use crate::event::{
    LifecycleRequest, LifecycleStatus, RequestType, RouteProperties, StatusReporter,
};
use crate::model::{Route, RouteTable};
use crate::paginate::collect_all;
use crate::Result;

/// Connectivity class of a route table, derived fresh on every pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteTableClass {
    /// Carries a route through an internet gateway
    Public,
    /// Sends default traffic through a NAT gateway or a routed instance
    Private,
    /// Neither public nor private
    Isolated,
}

/// A network's route tables partitioned by connectivity class.
///
/// The main-associated table is excluded entirely. Checks run in public,
/// private, isolated order and the first match wins, so a table satisfying
/// both the public and the private predicate lands in `public` only.
#[derive(Clone, Debug, Default)]
pub struct ClassifiedTables {
    /// Tables with an internet-gateway route
    pub public: Vec<RouteTable>,
    /// Tables with private default egress
    pub private: Vec<RouteTable>,
    /// Everything else
    pub isolated: Vec<RouteTable>,
}

impl ClassifiedTables {
    /// Tables in convergence order: public, then private, then isolated
    pub fn iter(&self) -> impl Iterator<Item = (RouteTableClass, &RouteTable)> {
        self.public
            .iter()
            .map(|table| (RouteTableClass::Public, table))
            .chain(
                self.private
                    .iter()
                    .map(|table| (RouteTableClass::Private, table)),
            )
            .chain(
                self.isolated
                    .iter()
                    .map(|table| (RouteTableClass::Isolated, table)),
            )
    }

    /// Number of classified tables
    pub fn len(&self) -> usize {
        self.public.len() + self.private.len() + self.isolated.len()
    }

    /// Whether the network has no eligible tables
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition a network's route tables by connectivity class
pub fn classify(tables: Vec<RouteTable>) -> ClassifiedTables {
    let mut classified = ClassifiedTables::default();
    for table in tables {
        if table.is_main() {
            debug!(table = %table.id, "skipping main route table");
            continue;
        }
        if table.routes.iter().any(Route::is_internet_gateway) {
            classified.public.push(table);
        } else if table.routes.iter().any(Route::is_private_egress) {
            classified.private.push(table);
        } else {
            classified.isolated.push(table);
        }
    }
    classified
}

/// What converging a single table did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteAction {
    /// No route existed; one was created
    Created,
    /// A stale route bound to a different peering link was replaced
    Replaced,
    /// The desired route was already in place
    Unchanged,
    /// The route was removed
    Deleted,
    /// No route to the destination existed, or the service had already
    /// dropped it
    AlreadyAbsent,
    /// The delete call failed; the pass continued with the other tables
    Failed(String),
}

/// Outcome of converging one route table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableOutcome {
    /// Table the action applied to
    pub route_table_id: String,
    /// Connectivity class assigned this pass
    pub class: RouteTableClass,
    /// What happened
    pub action: RouteAction,
}

/// Every per-table outcome from one reconciliation pass, in convergence order
#[derive(Clone, Debug, Default)]
pub struct RoutePassSummary {
    /// One entry per eligible table
    pub outcomes: Vec<TableOutcome>,
}

impl RoutePassSummary {
    /// Ids of tables whose delete attempt failed
    pub fn failures(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.action, RouteAction::Failed(_)))
            .map(|outcome| outcome.route_table_id.as_str())
            .collect()
    }
}

/// List the network's tables and classify them for one pass
async fn list_and_classify(
    client: &dyn NetworkClient,
    network_id: &str,
) -> Result<ClassifiedTables> {
    let tables = collect_all(|cursor| client.list_route_tables(network_id, cursor)).await?;
    debug!(count = tables.len(), "listed route tables");
    Ok(classify(tables))
}

/// Converge one table toward the desired peering route
async fn upsert_route(
    client: &dyn NetworkClient,
    table: &RouteTable,
    destination: &str,
    peering_link: &str,
) -> Result<RouteAction> {
    match table.route_to(destination) {
        None => {
            info!(table = %table.id, destination, peering_link, "no existing route, creating");
            client
                .create_route(&table.id, destination, peering_link)
                .await?;
            Ok(RouteAction::Created)
        }
        Some(route) if route.peering_link.as_deref() != Some(peering_link) => {
            // A route to the destination bound elsewhere means a previous
            // peering teardown never finished. Replace it.
            info!(
                table = %table.id,
                destination,
                stale = route.peering_link.as_deref().unwrap_or("<none>"),
                "replacing route left by an incomplete teardown"
            );
            if let Err(err) = client.delete_route(&table.id, destination).await {
                if !err.is_route_not_found() {
                    return Err(err);
                }
            }
            client
                .create_route(&table.id, destination, peering_link)
                .await?;
            Ok(RouteAction::Replaced)
        }
        Some(_) => {
            debug!(table = %table.id, destination, peering_link, "route already converged");
            Ok(RouteAction::Unchanged)
        }
    }
}

/// Remove one table's route to the destination, best-effort.
///
/// A route the snapshot or the service no longer has counts as success; any
/// other failure is recorded so the pass can continue with the next table.
async fn delete_route(
    client: &dyn NetworkClient,
    table: &RouteTable,
    destination: &str,
) -> RouteAction {
    if table.route_to(destination).is_none() {
        debug!(table = %table.id, destination, "no route to remove");
        return RouteAction::AlreadyAbsent;
    }

    match client.delete_route(&table.id, destination).await {
        Ok(()) => {
            info!(table = %table.id, destination, "deleted route");
            RouteAction::Deleted
        }
        Err(err) if err.is_route_not_found() => {
            info!(table = %table.id, destination, "route already gone");
            RouteAction::AlreadyAbsent
        }
        Err(err) => {
            warn!(table = %table.id, destination, error = %err, "route delete failed, continuing");
            RouteAction::Failed(err.to_string())
        }
    }
}

/// Ensure a route to the destination through the peering link on every
/// eligible table in the network.
///
/// Applying this twice with identical inputs leaves state unchanged after the
/// first application: converged tables are recognized and skipped.
#[instrument(skip(client, props), fields(network = %props.network_id))]
pub async fn converge_routes(
    client: &dyn NetworkClient,
    props: &RouteProperties,
) -> Result<RoutePassSummary> {
    let classified = list_and_classify(client, &props.network_id).await?;
    let mut summary = RoutePassSummary::default();

    for (class, table) in classified.iter() {
        let action = upsert_route(
            client,
            table,
            &props.destination_cidr,
            &props.peering_link_id,
        )
        .await?;
        summary.outcomes.push(TableOutcome {
            route_table_id: table.id.clone(),
            class,
            action,
        });
    }

    Ok(summary)
}

/// Remove the destination's route from every eligible table in the network.
///
/// Per-table failures are recorded in the summary and do not stop the pass.
#[instrument(skip(client, props), fields(network = %props.network_id))]
pub async fn remove_routes(
    client: &dyn NetworkClient,
    props: &RouteProperties,
) -> Result<RoutePassSummary> {
    let classified = list_and_classify(client, &props.network_id).await?;
    let mut summary = RoutePassSummary::default();

    for (class, table) in classified.iter() {
        let action = delete_route(client, table, &props.destination_cidr).await;
        summary.outcomes.push(TableOutcome {
            route_table_id: table.id.clone(),
            class,
            action,
        });
    }

    Ok(summary)
}

/// Reconcile peering routes for one lifecycle event.
///
/// Create and update converge every table toward the desired route; delete
/// removes it. Exactly one terminal status is delivered per invocation, and
/// on fatal error the Failed report goes out before the error is returned to
/// the caller.
#[instrument(
    skip(client, reporter, request),
    fields(
        network = %request.resource_properties.network_id,
        request = ?request.request_type,
    )
)]
pub async fn handle_route_event(
    client: &dyn NetworkClient,
    reporter: &dyn StatusReporter,
    request: &LifecycleRequest<RouteProperties>,
) -> Result<RoutePassSummary> {
    let props = &request.resource_properties;

    let pass = match request.request_type {
        RequestType::Delete => {
            info!(
                destination = %props.destination_cidr,
                peering_link = %props.peering_link_id,
                "removing peering routes"
            );
            remove_routes(client, props).await
        }
        RequestType::Create | RequestType::Update => {
            info!(
                destination = %props.destination_cidr,
                peering_link = %props.peering_link_id,
                "converging peering routes"
            );
            converge_routes(client, props).await
        }
    };

    match pass {
        Ok(summary) => {
            reporter.report(LifecycleStatus::Success).await?;
            Ok(summary)
        }
        Err(err) => {
            error!(error = %err, "route reconciliation failed");
            if let Err(report_err) = reporter.report(LifecycleStatus::Failed).await {
                warn!(error = %report_err, "failed to deliver terminal status");
            }
            Err(err)
        }
    }
}
