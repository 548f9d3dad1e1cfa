//! Request/response correlation over UDP, and the iterative lookups built on it.

pub mod config;
mod handle_request;
mod inflight_requests;
mod iterative_query;
mod put_query;
mod socket;

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace};

use crate::common::{
    Contact, FindValue, Id, Message, MessageType, RequestSpecific, ResponseSpecific,
};
use crate::node::LocalNode;
use crate::Result;

pub use config::Config;
use handle_request::handle_request;
use inflight_requests::InflightRequests;
use iterative_query::{IterativeQuery, QueryKind};
use socket::DhtSocket;

/// Every node listens on this port unless configured otherwise.
pub const DEFAULT_PORT: u16 = 20000;
/// Default request timeout before abandoning an inflight request to a non-responding node.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Number of concurrent requests of a single lookup.
pub const ALPHA: usize = 3;
/// A lookup stops once this many responses in a row brought no closer contact.
pub const MAX_ROUNDS_WITHOUT_IMPROVEMENT: usize = 6;

#[derive(Debug, Clone)]
/// Handle to a running node: its socket, the receiver thread, and the local state.
pub struct Rpc {
    inner: Arc<RpcInner>,
}

#[derive(Debug)]
pub(crate) struct RpcInner {
    pub(crate) node: LocalNode,
    pub(crate) socket: DhtSocket,
    inflight_requests: InflightRequests,
    config: Config,
    running: AtomicBool,
}

impl Rpc {
    /// Bind the socket and spawn the receiver thread.
    pub fn new(config: Config) -> Result<Self> {
        let id = config.id.unwrap_or_else(Id::random);
        let socket = DhtSocket::new(&config)?;

        let inner = Arc::new(RpcInner {
            node: LocalNode::new(id),
            socket,
            inflight_requests: InflightRequests::new(),
            config,
            running: AtomicBool::new(true),
        });

        let address = inner.socket.local_addr();
        info!(?id, ?address, "Kademlia node listening");

        let receiver = Arc::downgrade(&inner);
        thread::Builder::new()
            .name(format!("kadnode-{address}"))
            .spawn(move || RpcInner::run(receiver, address))?;

        Ok(Rpc { inner })
    }

    // === Getters ===

    pub fn id(&self) -> &Id {
        self.inner.node.id()
    }

    /// Returns the address the socket is listening to.
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.inner.socket.local_addr()
    }

    pub fn node(&self) -> &LocalNode {
        &self.inner.node
    }

    // === Public Methods ===

    /// Stop the receiver thread. Requests still waiting will time out.
    ///
    /// Dropping every handle stops it as well.
    pub fn shutdown(&self) {
        self.inner.running.store(false, Ordering::Relaxed);
    }

    pub fn ping(&self, address: Ipv4Addr) -> bool {
        matches!(
            self.request(address, RequestSpecific::Ping),
            Some(ResponseSpecific::Ping)
        )
    }

    pub fn store(&self, contact: &Contact, value: Bytes) -> bool {
        matches!(
            self.request(contact.address, RequestSpecific::Store(value)),
            Some(ResponseSpecific::Store)
        )
    }

    /// Ask `contact` for its closest contacts to `target`.
    pub fn find_node(&self, contact: &Contact, target: Id) -> Option<Vec<Contact>> {
        match self.request(contact.address, RequestSpecific::FindNode(target)) {
            Some(ResponseSpecific::FindNode(contacts)) => Some(contacts),
            _ => None,
        }
    }

    /// Ask `contact` for the value stored under `digest`, or its closest
    /// contacts to it.
    pub fn find_value(&self, contact: &Contact, digest: Id) -> Option<FindValue> {
        match self.request(contact.address, RequestSpecific::FindValue(digest)) {
            Some(ResponseSpecific::FindValue(find_value)) => Some(find_value),
            _ => None,
        }
    }

    /// Iterative lookup of the `max_count` closest contacts to `target`.
    ///
    /// Returns an empty list if the routing table is empty.
    pub fn lookup_contact(&self, target: Id, max_count: usize) -> Vec<Contact> {
        let seed = self.node().closest_contacts(&target);

        if seed.is_empty() {
            debug!(?target, "No route for lookup");
            return vec![];
        }

        let mut contacts = IterativeQuery::run(self, target, QueryKind::FindNode, seed).contacts;
        contacts.truncate(max_count);

        contacts
    }

    /// Find the value stored under `digest`, locally first, then iteratively
    /// on the network.
    pub fn lookup_data(&self, digest: Id) -> Option<Bytes> {
        if let Some(value) = self.node().lookup_data(&digest) {
            return Some(value);
        }

        let seed = self.node().closest_contacts(&digest);

        if seed.is_empty() {
            debug!(?digest, "No route for lookup");
            return None;
        }

        IterativeQuery::run(self, digest, QueryKind::FindValue, seed).value
    }

    /// Store `value` at the `replication` closest nodes to its digest, or
    /// locally if no other node is known. Returns the digest.
    pub fn store_data(&self, value: Bytes, replication: usize) -> Id {
        put_query::store_data(self, value, replication)
    }

    // === Private Methods ===

    /// Send a request and block until a response or the request timeout.
    fn request(&self, address: Ipv4Addr, request: RequestSpecific) -> Option<ResponseSpecific> {
        let inner = &self.inner;
        let (token, receiver) = inner.inflight_requests.add();

        let message = Message::request(token, *self.id(), request);
        // Every node listens on the same port as we do.
        let port = inner.socket.local_addr().port();
        inner.socket.send(SocketAddrV4::new(address, port), &message);

        let response = receiver.recv_timeout(inner.config.request_timeout).ok();

        inner.inflight_requests.remove(token);

        if response.is_none() {
            debug!(
                ?address,
                kind = ?message.kind(),
                inflight = inner.inflight_requests.len(),
                "Request timed out"
            );
        }

        response
    }
}

impl RpcInner {
    /// The receiver loop, until [Rpc::shutdown] or until the last [Rpc]
    /// handle is dropped, which also closes the socket.
    fn run(rpc: Weak<RpcInner>, address: SocketAddrV4) {
        while let Some(inner) = rpc.upgrade() {
            if !inner.running.load(Ordering::Relaxed) {
                break;
            }

            if let Some((message, from)) = inner.socket.recv_from() {
                inner.handle_message(message, from);
            }
        }

        debug!(?address, "Receiver thread stopped");
    }

    fn handle_message(&self, message: Message, from: SocketAddrV4) {
        // Learn every node that talks to us.
        self.node
            .add_contact(Contact::new(message.sender_id, *from.ip()));

        match message.message_type {
            MessageType::Request(request) => {
                handle_request(self, from, message.token, request);
            }
            MessageType::Response(response) => {
                if !self.inflight_requests.resolve(message.token, response) {
                    trace!(
                        context = "socket_validation",
                        token = message.token,
                        ?from,
                        "Unexpected response token"
                    );
                }
            }
        }
    }
}
