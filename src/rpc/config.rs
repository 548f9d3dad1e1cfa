use std::{net::Ipv4Addr, time::Duration};

use crate::common::Id;

use super::{DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT};

#[derive(Debug, Clone)]
/// Dht Configurations
pub struct Config {
    /// This node's Id.
    ///
    /// Defaults to None, where a random Id is generated.
    pub id: Option<Id>,
    /// Local address to bind the UDP socket to.
    ///
    /// Defaults to `0.0.0.0`
    pub bind_address: Ipv4Addr,
    /// Port to listen on, and to send requests to.
    ///
    /// Every node of the network is expected to listen on the same port,
    /// since contacts only carry an IPv4 address.
    ///
    /// Defaults to [DEFAULT_PORT]
    pub port: u16,
    /// UDP socket request timeout duration.
    ///
    /// The longer this duration is, the longer lookups wait on unresponsive nodes.
    /// The shorter this duration is, the more responses from busy nodes we miss out on.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: None,
            bind_address: Ipv4Addr::UNSPECIFIED,
            port: DEFAULT_PORT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
