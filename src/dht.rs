//! Dht node.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::{
    common::{Contact, Id, MAX_BUCKET_SIZE_K},
    rpc::{Config, Rpc},
    Result,
};

#[derive(Debug, Clone)]
/// Kademlia Dht node.
///
/// Cloning returns another handle to the same node.
pub struct Dht(Rpc);

#[derive(Debug, Default, Clone)]
/// A builder for the [Dht] node.
pub struct DhtBuilder(Config);

impl DhtBuilder {
    /// Set this node's Id instead of a random one.
    pub fn id(mut self, id: Id) -> Self {
        self.0.id = Some(id);
        self
    }

    /// Set the local address to bind to.
    pub fn bind_address(mut self, address: Ipv4Addr) -> Self {
        self.0.bind_address = address;
        self
    }

    /// Set the port to listen on and send requests to.
    pub fn port(mut self, port: u16) -> Self {
        self.0.port = port;
        self
    }

    /// Set the duration after which an unanswered request fails.
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.0.request_timeout = request_timeout;
        self
    }

    /// Create a Dht node, failing if the socket can not be bound.
    pub fn build(self) -> Result<Dht> {
        Dht::new(self.0)
    }
}

impl Dht {
    /// Create a new Dht node.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Dht(Rpc::new(config)?))
    }

    /// Returns a builder to edit settings before creating a Dht node.
    pub fn builder() -> DhtBuilder {
        DhtBuilder::default()
    }

    // === Getters ===

    pub fn id(&self) -> Id {
        *self.0.id()
    }

    /// Returns the address the node is listening to.
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.0.local_addr()
    }

    pub fn routing_table_size(&self) -> usize {
        self.0.node().routing_table_size()
    }

    // === Public Methods ===

    /// Stop listening. Lookups still running fail once their requests time out.
    ///
    /// The node also stops once every clone of this handle, and every lookup
    /// or store it started, is dropped or done.
    pub fn shutdown(&self) {
        self.0.shutdown();
    }

    /// Ping a node, returning true if it answered before the request timeout.
    pub fn ping(&self, address: Ipv4Addr) -> bool {
        self.0.ping(address)
    }

    /// Join the network through the `seeds`.
    ///
    /// Every seed is pinged, answering seeds land in the routing table. If any
    /// answered, a lookup of our own Id fills the rest of the routing table.
    /// Returns false if none answered.
    pub fn bootstrap(&self, seeds: &[Ipv4Addr]) -> bool {
        let mut bootstrapped = false;

        for seed in seeds {
            info!(?seed, "Pinging bootstrap node");

            if self.ping(*seed) {
                debug!(?seed, "Bootstrap node answered");
                bootstrapped = true;
            } else {
                warn!(?seed, "Bootstrap node did not answer");
            }
        }

        if !bootstrapped {
            warn!("No bootstrap nodes answered, bootstrap failed");
            return false;
        }

        let contacts = self.0.lookup_contact(self.id(), MAX_BUCKET_SIZE_K);
        self.add_contacts(contacts);

        info!(table_size = self.routing_table_size(), "Bootstrap successful");

        true
    }

    pub fn add_contact(&self, contact: Contact) -> bool {
        self.0.node().add_contact(contact)
    }

    pub fn add_contacts(&self, contacts: Vec<Contact>) {
        self.0.node().add_contacts(contacts)
    }

    /// Iterative lookup of the `max_count` closest contacts to `target`.
    pub fn lookup_contact(&self, target: Id, max_count: usize) -> Vec<Contact> {
        self.0.lookup_contact(target, max_count)
    }

    /// Find a value by its digest, locally or on the network.
    pub fn lookup_data(&self, digest: Id) -> Option<Bytes> {
        self.0.lookup_data(digest)
    }

    /// Find a value by its digest in the local store only.
    pub fn lookup_data_local(&self, digest: Id) -> Option<Bytes> {
        self.0.node().lookup_data(&digest)
    }

    /// Store a value at the `replication` closest nodes to its digest, and
    /// return the digest.
    ///
    /// Replication is best effort, failed stores are not reported. If no
    /// other node is known, the value is stored locally.
    pub fn store_data<T: Into<Bytes>>(&self, value: T, replication: usize) -> Id {
        self.0.store_data(value.into(), replication)
    }

    /// Store a value locally only, and return its digest.
    pub fn store_local<T: Into<Bytes>>(&self, value: T) -> Id {
        self.0.node().store(value.into())
    }
}

/// Create a testnet of Dht nodes on loopback addresses `127.0.0.1`,
/// `127.0.0.2`, ..., all listening on the same free port, the first one being
/// the bootstrap node of the others.
#[derive(Debug)]
pub struct Testnet {
    pub bootstrap: Vec<Ipv4Addr>,
    pub nodes: Vec<Dht>,
    pub port: u16,
}

impl Testnet {
    pub fn new(count: usize) -> Result<Testnet> {
        Self::with_request_timeout(count, Duration::from_secs(2))
    }

    pub fn with_request_timeout(count: usize, request_timeout: Duration) -> Result<Testnet> {
        let port = UdpSocket::bind("127.0.0.1:0")?.local_addr()?.port();

        let mut nodes: Vec<Dht> = vec![];
        let mut bootstrap = vec![];

        for i in 0..count {
            let address = loopback(i);

            let node = Dht::builder()
                .bind_address(address)
                .port(port)
                .request_timeout(request_timeout)
                .build()?;

            if i == 0 {
                bootstrap.push(address);
            } else {
                node.bootstrap(&bootstrap);
            }

            nodes.push(node)
        }

        Ok(Self {
            bootstrap,
            nodes,
            port,
        })
    }

    /// A node outside of the testnet, using the testnet's port.
    pub fn node(&self, index: usize) -> Result<Dht> {
        Dht::builder()
            .bind_address(loopback(index))
            .port(self.port)
            .request_timeout(Duration::from_secs(2))
            .build()
    }
}

impl Drop for Testnet {
    fn drop(&mut self) {
        for node in &self.nodes {
            node.shutdown();
        }
    }
}

/// `127.0.0.1` for `0`, `127.0.0.2` for `1` ...
fn loopback(index: usize) -> Ipv4Addr {
    let index = index as u32 + 1;

    Ipv4Addr::new(127, (index >> 16) as u8, (index >> 8) as u8, index as u8)
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn shutdown() {
        let dht = Dht::builder()
            .bind_address(Ipv4Addr::LOCALHOST)
            .port(0)
            .request_timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        assert!(dht.ping(Ipv4Addr::LOCALHOST));

        let clone = dht.clone();
        clone.shutdown();
        thread::sleep(Duration::from_millis(50));

        assert!(!dht.ping(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn loopback_addresses() {
        assert_eq!(loopback(0), Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(loopback(255), Ipv4Addr::new(127, 0, 1, 0));
    }

    #[test]
    fn store_locally_without_contacts() {
        let dht = Dht::builder()
            .bind_address(Ipv4Addr::LOCALHOST)
            .port(0)
            .build()
            .unwrap();

        let digest = dht.store_data(&b"hej"[..], 5);

        assert_eq!(digest.to_string(), "c412b37f8c0484e6db8bce177ae88c5443b26e92");
        assert_eq!(dht.lookup_data(digest), Some(Bytes::from_static(b"hej")));
        assert_eq!(
            dht.lookup_data_local(digest),
            Some(Bytes::from_static(b"hej"))
        );

        dht.shutdown();
    }

    #[test]
    fn no_route() {
        let dht = Dht::builder()
            .bind_address(Ipv4Addr::LOCALHOST)
            .port(0)
            .build()
            .unwrap();

        assert!(dht.lookup_contact(Id::random(), 20).is_empty());
        assert_eq!(dht.lookup_data(Id::random()), None);

        dht.shutdown();
    }

    #[test]
    fn bootstrap_fails_without_seeds() {
        let dht = Dht::builder()
            .bind_address(Ipv4Addr::LOCALHOST)
            .port(0)
            .request_timeout(Duration::from_millis(100))
            .build()
            .unwrap();

        assert!(!dht.bootstrap(&[]));
        assert!(!dht.bootstrap(&[Ipv4Addr::new(127, 0, 0, 123)]));
        assert_eq!(dht.routing_table_size(), 0);

        dht.shutdown();
    }

    #[test]
    fn testnet_bootstrap() {
        let testnet = Testnet::new(5).unwrap();

        for node in &testnet.nodes {
            assert!(node.routing_table_size() > 0);
        }

        // The bootstrap node learned every node that pinged it.
        assert_eq!(testnet.nodes[0].routing_table_size(), 4);
    }

    #[test]
    fn lookup_value_on_network() {
        let testnet = Testnet::new(5).unwrap();

        let digest = testnet.nodes[0].store_local(&b"Hello"[..]);

        let start = Instant::now();
        let value = testnet.nodes[4].lookup_data(digest);

        assert_eq!(value, Some(Bytes::from_static(b"Hello")));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
