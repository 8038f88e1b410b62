//! Peer connection configuration

use std::net::Ipv4Addr;
use std::time::Duration;

/// Configuration for one Diameter peer connection
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Name used in log lines
    pub name: String,

    /// Remote peer address, `host:port`
    pub peer_addr: String,

    /// Local Origin-Host (FQDN)
    pub origin_host: String,

    /// Local Origin-Realm
    pub origin_realm: String,

    /// Local Host-IP-Address advertised in the CER
    pub host_ip: Ipv4Addr,

    /// Product-Name advertised in the CER
    pub product_name: String,

    /// Vendor-Id advertised in the CER
    pub vendor_id: u32,

    /// Auth-Application-Id advertised in the CER
    pub auth_application_id: u32,

    /// Per-attempt TCP dial timeout
    pub dial_timeout: Duration,

    /// Fixed wait between failed dial attempts; reconnection is perpetual
    pub retry_interval: Duration,

    /// Number of dispatcher tasks sharing the event queues
    pub dispatcher_pool: usize,

    /// Number of writer tasks draining the outbound byte queue
    pub writer_pool: usize,

    /// Report dropped/failed writes as peer events instead of only logging
    /// them. Off by default: a frame queued while the link is down is
    /// silently discarded, matching the legacy behavior.
    pub surface_write_errors: bool,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            name: "diam".to_string(),
            peer_addr: format!("127.0.0.1:{}", crate::DIAMETER_PORT),
            origin_host: "client.example.com".to_string(),
            origin_realm: "example.com".to_string(),
            host_ip: Ipv4Addr::LOCALHOST,
            product_name: "diameter-peer".to_string(),
            vendor_id: 0,
            auth_application_id: crate::common::app_id::CREDIT_CONTROL,
            dial_timeout: Duration::from_secs(2),
            retry_interval: Duration::from_secs(5),
            dispatcher_pool: 10,
            writer_pool: 10,
            surface_write_errors: false,
        }
    }
}
