use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use flume::{Receiver, Sender};

use crate::common::ResponseSpecific;

/// Requests sent by this node that are still waiting for a response,
/// keyed by their transaction token.
#[derive(Debug, Default)]
pub struct InflightRequests {
    requests: RwLock<HashMap<u64, Sender<ResponseSpecific>>>,
}

impl InflightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new inflight request under a fresh random token.
    ///
    /// The returned receiver yields the response, if one arrives.
    pub fn add(&self) -> (u64, Receiver<ResponseSpecific>) {
        let (sender, receiver) = flume::bounded(1);

        let mut requests = self
            .requests
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut token = rand::random::<u64>();
        while requests.contains_key(&token) {
            token = rand::random();
        }

        requests.insert(token, sender);

        (token, receiver)
    }

    /// Hand a response to the request waiting on `token`.
    ///
    /// Returns false if no request is waiting, for example because it
    /// already timed out.
    pub fn resolve(&self, token: u64, response: ResponseSpecific) -> bool {
        let requests = self
            .requests
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        match requests.get(&token) {
            // Only the first response to a token is kept.
            Some(sender) => sender.try_send(response).is_ok(),
            None => false,
        }
    }

    pub fn remove(&self, token: u64) {
        self.requests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&token);
    }

    pub fn len(&self) -> usize {
        self.requests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
