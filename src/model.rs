//! Domain records read fresh from the networking service
//!
//! Nothing here is owned or cached by the reconcilers: every invocation
//! re-lists from the service and decides against that snapshot. The types
//! mirror what the service reports, normalized so that identifier fields the
//! service may omit become empty strings (which never match anything).

use crate::{DEFAULT_ROUTE_CIDR, INTERNET_GATEWAY_PREFIX};

/// One routing rule inside a route table.
///
/// At most one of the target references is semantically authoritative, though
/// the service's data shape allows several to co-occur on the same rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Route {
    /// Destination address range (CIDR)
    pub destination: Option<String>,
    /// Gateway reference (internet gateway, virtual gateway, ...)
    pub gateway: Option<String>,
    /// NAT gateway reference
    pub nat_gateway: Option<String>,
    /// Instance reference for legacy instance-routed rules
    pub instance: Option<String>,
    /// Account owning the routed instance
    pub instance_owner: Option<String>,
    /// Network interface the rule routes through
    pub network_interface: Option<String>,
    /// Peering link the rule routes through
    pub peering_link: Option<String>,
}

impl Route {
    /// Whether this rule targets the default destination
    pub fn is_default_destination(&self) -> bool {
        self.destination.as_deref() == Some(DEFAULT_ROUTE_CIDR)
    }

    /// Whether this rule egresses through an internet gateway
    pub fn is_internet_gateway(&self) -> bool {
        self.gateway
            .as_deref()
            .is_some_and(|id| id.starts_with(INTERNET_GATEWAY_PREFIX))
    }

    /// Whether this is a legacy instance-routed rule: instance, instance
    /// owner, and network interface all present on the same rule
    pub fn is_instance_routed(&self) -> bool {
        self.instance.is_some() && self.instance_owner.is_some() && self.network_interface.is_some()
    }

    /// Whether this rule sends default traffic out privately, through a NAT
    /// gateway or a routed instance
    pub fn is_private_egress(&self) -> bool {
        self.is_default_destination() && (self.nat_gateway.is_some() || self.is_instance_routed())
    }
}

/// Association between a route table and a subnet (or the network itself)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Association {
    /// Whether this is the network's implicit/main association
    pub main: bool,
}

/// A route table as listed from the networking service
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteTable {
    /// Table identifier
    pub id: String,
    /// Routing rules, in service order
    pub routes: Vec<Route>,
    /// Subnet associations
    pub associations: Vec<Association>,
}

impl RouteTable {
    /// Whether this table carries the network's main association.
    ///
    /// Main tables are never classified, mutated, or deleted.
    pub fn is_main(&self) -> bool {
        self.associations.iter().any(|a| a.main)
    }

    /// The rule targeting `destination`, if one exists
    pub fn route_to(&self, destination: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.destination.as_deref() == Some(destination))
    }
}

/// A network interface as listed from the networking service
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkInterface {
    /// Interface identifier
    pub id: String,
    /// Owning network
    pub network: String,
    /// Names of the security groups attached to this interface
    pub group_names: Vec<String>,
}

/// A security group as listed from the networking service
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityGroup {
    /// Group identifier
    pub id: String,
    /// Owning network
    pub network: String,
    /// Group name
    pub name: String,
}
