//! In memory content addressed store.

use std::collections::HashMap;

use bytes::Bytes;

use crate::common::Id;

#[derive(Debug, Default, Clone)]
/// Blobs keyed by their SHA-1 [Id::digest].
pub struct ContentStore {
    values: HashMap<Id, Bytes>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under its digest and return the digest.
    pub fn put(&mut self, value: Bytes) -> Id {
        let digest = Id::digest(&value);

        self.values.insert(digest, value);

        digest
    }

    pub fn get(&self, digest: &Id) -> Option<Bytes> {
        self.values.get(digest).cloned()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn put_get() {
        let mut store = ContentStore::new();

        let digest = store.put(Bytes::from_static(b"hej"));

        assert_eq!(
            digest,
            Id::from_str("c412b37f8c0484e6db8bce177ae88c5443b26e92").unwrap()
        );
        assert_eq!(store.get(&digest), Some(Bytes::from_static(b"hej")));
        assert_eq!(store.get(&Id::random()), None);
    }

    #[test]
    fn same_value_is_stored_once() {
        let mut store = ContentStore::new();

        store.put(Bytes::from_static(b"Hello"));
        store.put(Bytes::from_static(b"Hello"));

        assert_eq!(store.len(), 1);
    }
}
