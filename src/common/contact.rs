//! Struct and implementation of the Contact entry in the Kademlia routing table
use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    net::Ipv4Addr,
};

use crate::common::Id;

#[derive(Debug, Clone, Copy)]
/// Contact entry in Kademlia routing table.
///
/// Two contacts are equal if their ids are equal, the address is only
/// where the peer was last seen.
pub struct Contact {
    pub id: Id,
    pub address: Ipv4Addr,
}

impl Contact {
    /// Creates a new Contact from an id and an IPv4 address.
    pub fn new(id: Id, address: Ipv4Addr) -> Contact {
        Contact { id, address }
    }

    #[cfg(test)]
    pub fn random() -> Contact {
        Contact {
            id: Id::random(),
            address: Ipv4Addr::from(rand::random::<u32>()),
        }
    }

    // === Getters ===

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    // === Public Methods ===

    /// XOR distance from this contact to `target`.
    pub fn distance(&self, target: &Id) -> Id {
        self.id.xor(target)
    }

    /// Compare the distances of two contacts to the same `target`.
    pub fn cmp_distance(&self, other: &Contact, target: &Id) -> Ordering {
        self.distance(target).cmp(&other.distance(target))
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Contact {}

impl Hash for Contact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl Display for Contact {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "contact(\"{}\", \"{}\")", self.id, self.address)
    }
}

/// Stable sort of `contacts` by ascending distance to `target`.
pub fn sort_by_distance(contacts: &mut [Contact], target: &Id) {
    contacts.sort_by_cached_key(|contact| contact.distance(target));
}
