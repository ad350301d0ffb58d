//! Private supervisor network.
//!
//! All managed plugin containers share one internal bridge network with fixed
//! addresses for the well-known services. The network is created on demand and
//! stale endpoints left behind by replaced containers are force-disconnected
//! before a new container joins under the same name.

use crate::docker::client::{DockerBridge, NetworkSpec};
use crate::docker::Result;
use bollard::models::Network;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Name of the private network.
pub const HEARTH_NETWORK: &str = "hearth";

/// Docker's default bridge network, left by containers that join the private
/// network.
const DEFAULT_BRIDGE: &str = "bridge";

/// Subnet of the private network in CIDR form.
pub const NETWORK_SUBNET: &str = "172.30.32.0/23";

/// Range dynamic endpoint addresses are allocated from.
pub const NETWORK_IP_RANGE: &str = "172.30.33.0/24";

/// Network gateway.
pub const GATEWAY_ADDRESS: Ipv4Addr = Ipv4Addr::new(172, 30, 32, 1);
/// Fixed address of the supervisor itself.
pub const SUPERVISOR_ADDRESS: Ipv4Addr = Ipv4Addr::new(172, 30, 32, 2);
/// Fixed address of the DNS plugin.
pub const DNS_ADDRESS: Ipv4Addr = Ipv4Addr::new(172, 30, 32, 3);
/// Fixed address of the audio plugin.
pub const AUDIO_ADDRESS: Ipv4Addr = Ipv4Addr::new(172, 30, 32, 4);
/// Fixed address of the CLI plugin.
pub const CLI_ADDRESS: Ipv4Addr = Ipv4Addr::new(172, 30, 32, 5);
/// Fixed address of the observer plugin.
pub const OBSERVER_ADDRESS: Ipv4Addr = Ipv4Addr::new(172, 30, 32, 6);
/// Reserved for a future fixed assignment; never handed out dynamically.
pub const RESERVED_ADDRESS: Ipv4Addr = Ipv4Addr::new(172, 30, 32, 7);

/// Manager for the private network.
///
/// Holds a cached inspection of the network; [`DockerNetwork::attach`] always
/// refreshes it before acting so stale-endpoint detection sees the daemon's
/// current view.
pub struct DockerNetwork {
    bridge: Arc<dyn DockerBridge>,
    cached: RwLock<Option<Network>>,
}

impl DockerNetwork {
    pub fn new(bridge: Arc<dyn DockerBridge>) -> Self {
        Self {
            bridge,
            cached: RwLock::new(None),
        }
    }

    /// Make sure the private network exists, creating it when missing.
    ///
    /// # Errors
    ///
    /// Daemon errors other than a missing network propagate.
    pub async fn ensure(&self) -> Result<()> {
        match self.bridge.inspect_network(HEARTH_NETWORK).await {
            Ok(network) => {
                *self.cached.write().await = Some(network);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                info!("Creating private network {}", HEARTH_NETWORK);
                self.bridge
                    .create_network(NetworkSpec {
                        name: HEARTH_NETWORK.to_string(),
                        subnet: NETWORK_SUBNET.to_string(),
                        gateway: GATEWAY_ADDRESS.to_string(),
                        ip_range: NETWORK_IP_RANGE.to_string(),
                    })
                    .await?;
                let network = self.bridge.inspect_network(HEARTH_NETWORK).await?;
                *self.cached.write().await = Some(network);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Refresh the cached inspection from the daemon.
    async fn reload(&self) -> Result<Network> {
        let network = self.bridge.inspect_network(HEARTH_NETWORK).await?;
        *self.cached.write().await = Some(network.clone());
        Ok(network)
    }

    /// Daemon IDs of endpoints currently attached under `name`.
    fn endpoints_named(network: &Network, name: &str) -> Vec<String> {
        network
            .containers
            .as_ref()
            .map(|containers| {
                containers
                    .iter()
                    .filter(|(_, endpoint)| endpoint.name.as_deref() == Some(name))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Attach a container to the private network.
    ///
    /// Creates the network when missing and force-disconnects any stale
    /// endpoint still registered under the same container name before
    /// connecting.
    ///
    /// # Errors
    ///
    /// Fails when the network cannot be created or the connect call fails.
    pub async fn attach(
        &self,
        container: &str,
        aliases: &[String],
        ipv4: Option<Ipv4Addr>,
    ) -> Result<()> {
        self.ensure().await?;
        let network = self.reload().await?;

        for stale in Self::endpoints_named(&network, container) {
            warn!(
                "Dropping stale endpoint {} for {} from {}",
                stale, container, HEARTH_NETWORK
            );
            if let Err(err) = self
                .bridge
                .disconnect_network(HEARTH_NETWORK, &stale, true)
                .await
            {
                if !err.is_not_found() {
                    warn!("Can't disconnect stale endpoint {}: {}", stale, err);
                }
            }
        }

        debug!(
            "Attaching {} to {} with address {:?}",
            container, HEARTH_NETWORK, ipv4
        );
        self.bridge
            .connect_network(HEARTH_NETWORK, container, aliases.to_vec(), ipv4)
            .await?;
        self.reload().await?;
        Ok(())
    }

    /// Detach a container from the private network.
    ///
    /// A container that is not attached counts as success.
    ///
    /// # Errors
    ///
    /// Transport failures propagate.
    pub async fn detach(&self, container: &str) -> Result<()> {
        match self
            .bridge
            .disconnect_network(HEARTH_NETWORK, container, true)
            .await
        {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }

    /// Remove a container from Docker's default bridge network.
    ///
    /// Containers joined to the private network must not keep their implicit
    /// default-bridge endpoint. A container that is not attached counts as
    /// success.
    ///
    /// # Errors
    ///
    /// Daemon refusals and transport failures propagate: a container left on
    /// the default bridge would bypass the private network's isolation.
    pub async fn detach_default_bridge(&self, container: &str) -> Result<()> {
        match self
            .bridge
            .disconnect_network(DEFAULT_BRIDGE, container, true)
            .await
        {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }

    /// The last inspection fetched from the daemon, if any.
    pub async fn cached(&self) -> Option<Network> {
        self.cached.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_addresses_sit_in_the_static_half() {
        // 172.30.32.0/24 is reserved for fixed assignments, dynamic
        // allocation starts at 172.30.33.0.
        for address in [
            GATEWAY_ADDRESS,
            SUPERVISOR_ADDRESS,
            DNS_ADDRESS,
            AUDIO_ADDRESS,
            CLI_ADDRESS,
            OBSERVER_ADDRESS,
            RESERVED_ADDRESS,
        ] {
            assert_eq!(address.octets()[..3], [172, 30, 32]);
        }
    }

    #[test]
    fn test_fixed_addresses_are_distinct() {
        let addresses = [
            GATEWAY_ADDRESS,
            SUPERVISOR_ADDRESS,
            DNS_ADDRESS,
            AUDIO_ADDRESS,
            CLI_ADDRESS,
            OBSERVER_ADDRESS,
            RESERVED_ADDRESS,
        ];
        for (i, a) in addresses.iter().enumerate() {
            for b in &addresses[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_endpoints_named_filters_by_name() {
        let mut containers = std::collections::HashMap::new();
        containers.insert(
            "id-1".to_string(),
            bollard::models::NetworkContainer {
                name: Some("hearth_audio".to_string()),
                ..Default::default()
            },
        );
        containers.insert(
            "id-2".to_string(),
            bollard::models::NetworkContainer {
                name: Some("hearth_dns".to_string()),
                ..Default::default()
            },
        );
        let network = Network {
            containers: Some(containers),
            ..Default::default()
        };

        assert_eq!(
            DockerNetwork::endpoints_named(&network, "hearth_audio"),
            vec!["id-1".to_string()]
        );
        assert!(DockerNetwork::endpoints_named(&network, "hearth_cli").is_empty());
    }
}
