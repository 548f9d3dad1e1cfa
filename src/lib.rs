//! A Kademlia DHT node over UDP.
//!
//! Nodes are addressed by 160 bits [Id]s, closeness is the XOR of two Ids, and
//! every node keeps a routing table of [Contact]s and an in memory store of
//! values keyed by their SHA-1 digest. Nodes answer PING, STORE, FIND_NODE and
//! FIND_VALUE requests, and [Dht] runs iterative lookups on top of them.
//!
//! ```no_run
//! use std::net::Ipv4Addr;
//!
//! use kadnode::Dht;
//!
//! let dht = Dht::builder().build().unwrap();
//! dht.bootstrap(&[Ipv4Addr::new(192, 168, 0, 1)]);
//!
//! let digest = dht.store_data(&b"Hello World!"[..], 5);
//! println!("{digest}");
//!
//! let value = dht.lookup_data(digest);
//! ```

mod common;
mod dht;
mod error;
mod node;
pub mod rpc;

pub use crate::common::{
    messages, sort_by_distance, Contact, ContentStore, Id, KBucket, RoutingTable, ID_SIZE,
    MAX_BUCKET_SIZE_K, MAX_DISTANCE,
};
pub use crate::node::LocalNode;
pub use bytes::Bytes;
pub use dht::{Dht, DhtBuilder, Testnet};
pub use error::{Error, Result};
