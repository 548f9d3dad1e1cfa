//! The local node: own Id, routing table and content store.

use std::sync::{PoisonError, RwLock};

use bytes::Bytes;

use crate::common::{Contact, ContentStore, Id, RoutingTable, MAX_BUCKET_SIZE_K};

#[derive(Debug)]
/// Local state shared by the inbound request handlers and the lookups.
///
/// Every access to the routing table goes through one [RwLock], so traffic
/// from other nodes and our own lookups never race on a bucket.
pub struct LocalNode {
    id: Id,
    routing_table: RwLock<RoutingTable>,
    store: RwLock<ContentStore>,
}

impl LocalNode {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            routing_table: RwLock::new(RoutingTable::new(id)),
            store: RwLock::new(ContentStore::new()),
        }
    }

    // === Getters ===

    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Returns a clone of the routing table.
    pub fn routing_table(&self) -> RoutingTable {
        self.routing_table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // === Public Methods ===

    pub fn add_contact(&self, contact: Contact) -> bool {
        self.routing_table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(contact)
    }

    pub fn add_contacts<I: IntoIterator<Item = Contact>>(&self, contacts: I) {
        let mut routing_table = self
            .routing_table
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        for contact in contacts {
            routing_table.add(contact);
        }
    }

    /// Up to [MAX_BUCKET_SIZE_K] contacts from the local routing table,
    /// closest to `target` first.
    pub fn closest_contacts(&self, target: &Id) -> Vec<Contact> {
        self.routing_table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .closest(target, MAX_BUCKET_SIZE_K)
    }

    /// Store `value` locally and return its digest.
    pub fn store(&self, value: Bytes) -> Id {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .put(value)
    }

    pub fn lookup_data(&self, digest: &Id) -> Option<Bytes> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(digest)
    }

    pub fn routing_table_size(&self) -> usize {
        self.routing_table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .size()
    }
}
