//! Fixed size Kademlia routing table

use std::slice::Iter;

use crate::common::{sort_by_distance, Contact, Id, MAX_DISTANCE};

/// K = the maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 20;

#[derive(Debug, Clone)]
/// Kademlia routing table of [MAX_DISTANCE] k-buckets.
///
/// Bucket `i` holds the contacts whose Id shares exactly `i` leading bits with
/// the owner's Id, so bucket `0` holds the furthest half of the Id space.
pub struct RoutingTable {
    id: Id,
    buckets: Vec<KBucket>,
}

impl RoutingTable {
    /// Create a new [RoutingTable] with a given id.
    pub fn new(id: Id) -> Self {
        let buckets = (0..MAX_DISTANCE).map(|_| KBucket::new()).collect();

        RoutingTable { id, buckets }
    }

    /// Returns the [Id] of this node, where the distance is measured from.
    pub fn id(&self) -> &Id {
        &self.id
    }

    // === Public Methods ===

    /// Attempts to add a contact to this routing table, and return `true` if it did.
    ///
    /// A contact that is already known is moved to the most recently seen
    /// end of its bucket, with its address refreshed. A new contact is
    /// dropped if its bucket is full.
    pub fn add(&mut self, contact: Contact) -> bool {
        if contact.id == self.id {
            // Do not add self to the routing_table
            return false;
        }

        let index = self.bucket_index(&contact.id);

        self.buckets[index].add(contact)
    }

    /// Remove a contact from this routing table.
    pub fn remove(&mut self, id: &Id) {
        let index = self.bucket_index(id);

        self.buckets[index].remove(id)
    }

    /// Return up to `count` contacts sorted by ascending distance to `target`.
    pub fn closest(&self, target: &Id, count: usize) -> Vec<Contact> {
        if count == 0 {
            return vec![];
        }

        let mut contacts = self.contacts().copied().collect::<Vec<_>>();

        sort_by_distance(&mut contacts, target);
        contacts.truncate(count);

        contacts
    }

    /// Index of the bucket `id` belongs to, the number of leading zero bits of
    /// its distance to this table's Id. Our own Id maps to `0`.
    pub fn bucket_index(&self, id: &Id) -> usize {
        let distance = self.id.xor(id);

        if distance.is_zero() {
            return 0;
        }

        distance.leading_zeros()
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.is_empty())
    }

    /// Return the number of contacts in this routing table.
    pub fn size(&self) -> usize {
        self.buckets
            .iter()
            .fold(0, |acc, bucket| acc + bucket.contacts.len())
    }

    /// Returns an iterator over the contacts in this routing table, bucket by bucket.
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.buckets.iter().flat_map(|bucket| bucket.iter())
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.buckets[self.bucket_index(id)].contains(id)
    }
}

/// A k-bucket ordered by recency, least recently seen first.
#[derive(Debug, Clone)]
pub struct KBucket {
    contacts: Vec<Contact>,
}

impl KBucket {
    pub fn new() -> Self {
        KBucket {
            contacts: Vec::with_capacity(MAX_BUCKET_SIZE_K),
        }
    }

    // === Public Methods ===

    pub fn add(&mut self, incoming: Contact) -> bool {
        if let Some(index) = self.iter().position(|c| c.id == incoming.id) {
            // Taking the incoming contact refreshes the address, in case the
            // peer moved.
            self.contacts.remove(index);
            self.contacts.push(incoming);

            true
        } else if self.contacts.len() < MAX_BUCKET_SIZE_K {
            self.contacts.push(incoming);

            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, id: &Id) {
        self.contacts.retain(|contact| contact.id() != id);
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn iter(&self) -> Iter<'_, Contact> {
        self.contacts.iter()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.iter().any(|contact| contact.id() == id)
    }
}

impl Default for KBucket {
    fn default() -> Self {
        Self::new()
    }
}
