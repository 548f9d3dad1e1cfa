//! Store a value at the closest nodes to its digest.

use std::thread;

use bytes::Bytes;
use tracing::{debug, warn};

use super::Rpc;
use crate::common::Id;

/// Look up the `replication` closest contacts to the digest of `value` and
/// send each of them a STORE request, without waiting for the responses.
///
/// If no contact is known the value is only stored locally.
pub(crate) fn store_data(rpc: &Rpc, value: Bytes, replication: usize) -> Id {
    let digest = Id::digest(&value);

    let contacts = rpc.lookup_contact(digest, replication);

    if contacts.is_empty() {
        debug!(?digest, "No contacts to replicate to, storing locally");
        rpc.node().store(value);

        return digest;
    }

    debug!(?digest, replicas = contacts.len(), "Replicating value");

    for contact in contacts {
        let rpc = rpc.clone();
        let value = value.clone();

        let spawned = thread::Builder::new()
            .name("kadnode-store".to_string())
            .spawn(move || {
                if !rpc.store(&contact, value) {
                    debug!(?digest, ?contact, "Store request failed");
                }
            });

        if let Err(error) = spawned {
            warn!(?error, "Could not spawn store request");
        }
    }

    digest
}
