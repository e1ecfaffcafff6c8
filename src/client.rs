//! Networking service client
//!
//! [`NetworkClient`] abstracts every operation the reconcilers consume from
//! the external networking service, so the flows can be driven against a mock
//! in tests while [`Ec2NetworkClient`] talks to the real service in
//! production. Listing operations return one page at a time; callers chain
//! them with [`crate::paginate`].

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::Filter;

#[cfg(test)]
use mockall::automock;

use crate::model::{Association, NetworkInterface, Route, RouteTable, SecurityGroup};
use crate::paginate::Page;
use crate::{Error, Result};

/// Filter key selecting resources by their owning network
const NETWORK_FILTER: &str = "vpc-id";

/// Operations consumed from the external networking service.
///
/// Every listing is region- and invocation-scoped: implementations must not
/// cache results between calls, because each reconciliation pass decides
/// against a fresh snapshot.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// List one page of the network's route tables
    async fn list_route_tables(
        &self,
        network_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<RouteTable>>;

    /// Create a route to `destination_cidr` through `peering_link_id`
    async fn create_route(
        &self,
        route_table_id: &str,
        destination_cidr: &str,
        peering_link_id: &str,
    ) -> Result<()>;

    /// Delete the route to `destination_cidr`.
    ///
    /// A route that is already absent surfaces as a `Service` error whose
    /// code satisfies [`Error::is_route_not_found`]; callers decide whether
    /// that counts as success.
    async fn delete_route(&self, route_table_id: &str, destination_cidr: &str) -> Result<()>;

    /// List one page of network interfaces.
    ///
    /// The service offers no network filter here; membership is checked by
    /// the caller.
    async fn list_network_interfaces(&self, cursor: Option<String>)
        -> Result<Page<NetworkInterface>>;

    /// Delete a network interface
    async fn delete_network_interface(&self, interface_id: &str) -> Result<()>;

    /// List one page of the network's security groups
    async fn list_security_groups(
        &self,
        network_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<SecurityGroup>>;

    /// Delete a security group
    async fn delete_security_group(&self, group_id: &str) -> Result<()>;
}

/// Production client backed by the EC2 API
pub struct Ec2NetworkClient {
    inner: aws_sdk_ec2::Client,
}

impl Ec2NetworkClient {
    /// Wrap an already-configured service client
    pub fn new(inner: aws_sdk_ec2::Client) -> Self {
        Self { inner }
    }

    /// Build a client from the invoking environment's default configuration
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(aws_sdk_ec2::Client::new(&config))
    }

    /// Build a client scoped to an explicit region
    pub async fn for_region(region: impl Into<String>) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self::new(aws_sdk_ec2::Client::new(&config))
    }
}

#[async_trait]
impl NetworkClient for Ec2NetworkClient {
    async fn list_route_tables(
        &self,
        network_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<RouteTable>> {
        let response = self
            .inner
            .describe_route_tables()
            .filters(
                Filter::builder()
                    .name(NETWORK_FILTER)
                    .values(network_id)
                    .build(),
            )
            .set_next_token(cursor)
            .send()
            .await
            .map_err(|e| service_error("describe route tables", e))?;

        Ok(Page {
            items: response
                .route_tables
                .unwrap_or_default()
                .into_iter()
                .map(map_route_table)
                .collect(),
            next: response.next_token,
        })
    }

    async fn create_route(
        &self,
        route_table_id: &str,
        destination_cidr: &str,
        peering_link_id: &str,
    ) -> Result<()> {
        self.inner
            .create_route()
            .route_table_id(route_table_id)
            .destination_cidr_block(destination_cidr)
            .vpc_peering_connection_id(peering_link_id)
            .send()
            .await
            .map_err(|e| service_error("create route", e))?;
        Ok(())
    }

    async fn delete_route(&self, route_table_id: &str, destination_cidr: &str) -> Result<()> {
        self.inner
            .delete_route()
            .route_table_id(route_table_id)
            .destination_cidr_block(destination_cidr)
            .send()
            .await
            .map_err(|e| service_error("delete route", e))?;
        Ok(())
    }

    async fn list_network_interfaces(
        &self,
        cursor: Option<String>,
    ) -> Result<Page<NetworkInterface>> {
        let response = self
            .inner
            .describe_network_interfaces()
            .set_next_token(cursor)
            .send()
            .await
            .map_err(|e| service_error("describe network interfaces", e))?;

        Ok(Page {
            items: response
                .network_interfaces
                .unwrap_or_default()
                .into_iter()
                .map(map_interface)
                .collect(),
            next: response.next_token,
        })
    }

    async fn delete_network_interface(&self, interface_id: &str) -> Result<()> {
        self.inner
            .delete_network_interface()
            .network_interface_id(interface_id)
            .send()
            .await
            .map_err(|e| service_error("delete network interface", e))?;
        Ok(())
    }

    async fn list_security_groups(
        &self,
        network_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<SecurityGroup>> {
        let response = self
            .inner
            .describe_security_groups()
            .filters(
                Filter::builder()
                    .name(NETWORK_FILTER)
                    .values(network_id)
                    .build(),
            )
            .set_next_token(cursor)
            .send()
            .await
            .map_err(|e| service_error("describe security groups", e))?;

        Ok(Page {
            items: response
                .security_groups
                .unwrap_or_default()
                .into_iter()
                .map(map_group)
                .collect(),
            next: response.next_token,
        })
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<()> {
        self.inner
            .delete_security_group()
            .group_id(group_id)
            .send()
            .await
            .map_err(|e| service_error("delete security group", e))?;
        Ok(())
    }
}

/// Map a service failure into [`Error::Service`], preserving the service's
/// classification code so callers can recognize idempotency signals
fn service_error<E, R>(context: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    Error::Service {
        code,
        message: format!("{context}: {}", DisplayErrorContext(&err)),
    }
}

fn map_route_table(table: aws_sdk_ec2::types::RouteTable) -> RouteTable {
    RouteTable {
        id: table.route_table_id.unwrap_or_default(),
        routes: table
            .routes
            .unwrap_or_default()
            .into_iter()
            .map(map_route)
            .collect(),
        associations: table
            .associations
            .unwrap_or_default()
            .into_iter()
            .map(|assoc| Association {
                main: assoc.main.unwrap_or(false),
            })
            .collect(),
    }
}

fn map_route(route: aws_sdk_ec2::types::Route) -> Route {
    Route {
        destination: route.destination_cidr_block,
        gateway: route.gateway_id,
        nat_gateway: route.nat_gateway_id,
        instance: route.instance_id,
        instance_owner: route.instance_owner_id,
        network_interface: route.network_interface_id,
        peering_link: route.vpc_peering_connection_id,
    }
}

fn map_interface(interface: aws_sdk_ec2::types::NetworkInterface) -> NetworkInterface {
    NetworkInterface {
        id: interface.network_interface_id.unwrap_or_default(),
        network: interface.vpc_id.unwrap_or_default(),
        group_names: interface
            .groups
            .unwrap_or_default()
            .into_iter()
            .filter_map(|group| group.group_name)
            .collect(),
    }
}

fn map_group(group: aws_sdk_ec2::types::SecurityGroup) -> SecurityGroup {
    SecurityGroup {
        id: group.group_id.unwrap_or_default(),
        network: group.vpc_id.unwrap_or_default(),
        name: group.group_name.unwrap_or_default(),
    }
}
