//! Iterative lookups of the closest contacts to a target, or of a value.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use super::{Rpc, ALPHA, MAX_ROUNDS_WITHOUT_IMPROVEMENT};
use crate::common::{sort_by_distance, Contact, FindValue, Id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueryKind {
    FindNode,
    FindValue,
}

/// An iterative process of concurrently sending a request to the closest known
/// contacts to the target, merging the closer contacts discovered in the
/// responses, and repeating until no closer contacts are found.
///
/// The query is shared by [ALPHA] worker threads, all of its state sits behind
/// one lock.
#[derive(Debug)]
pub(crate) struct IterativeQuery {
    target: Id,
    kind: QueryKind,
    state: Mutex<QueryState>,
    changed: Condvar,
}

#[derive(Debug)]
struct QueryState {
    /// Contacts not queried yet, closest first.
    frontier: Vec<Contact>,
    /// Ids of every contact ever added to the frontier.
    seen: HashSet<Id>,
    /// Every contact discovered, in discovery order.
    discovered: Vec<Contact>,
    best: Contact,
    since_improvement: usize,
    inflight: usize,
    value: Option<Bytes>,
}

#[derive(Debug)]
pub(crate) struct QueryResult {
    /// Discovered contacts sorted by distance to the target.
    pub contacts: Vec<Contact>,
    pub value: Option<Bytes>,
}

impl QueryState {
    fn is_done(&self) -> bool {
        self.value.is_some()
            || self.since_improvement > MAX_ROUNDS_WITHOUT_IMPROVEMENT
            || (self.frontier.is_empty() && self.inflight == 0)
    }

    /// Merge the contacts from a response, returning the ones not seen before.
    fn merge(&mut self, target: &Id, contacts: Vec<Contact>) -> Vec<Contact> {
        let mut learned = Vec::new();

        for contact in contacts {
            if self.seen.insert(contact.id) {
                self.frontier.push(contact);
                self.discovered.push(contact);
                learned.push(contact);
            }
        }

        sort_by_distance(&mut self.frontier, target);

        match self.frontier.first() {
            Some(closest) if closest.distance(target) < self.best.distance(target) => {
                self.best = *closest;
                self.since_improvement = 0;
            }
            _ => self.since_improvement += 1,
        }

        learned
    }
}

impl IterativeQuery {
    /// Run a query from the `seed` contacts until it is done.
    ///
    /// `seed` must not be empty. A value found by any worker ends the query
    /// right away, requests still inflight are left to time out.
    pub fn run(rpc: &Rpc, target: Id, kind: QueryKind, mut seed: Vec<Contact>) -> QueryResult {
        sort_by_distance(&mut seed, &target);

        let best = seed[0];

        let query = Arc::new(IterativeQuery {
            target,
            kind,
            state: Mutex::new(QueryState {
                seen: seed.iter().map(|contact| contact.id).collect(),
                discovered: seed.clone(),
                frontier: seed,
                best,
                since_improvement: 0,
                inflight: 0,
                value: None,
            }),
            changed: Condvar::new(),
        });

        trace!(?target, ?kind, "New Query");

        let mut workers = 0;
        for i in 0..ALPHA {
            let rpc = rpc.clone();
            let worker = query.clone();

            match thread::Builder::new()
                .name(format!("kadnode-query-{i}"))
                .spawn(move || worker.work(&rpc))
            {
                Ok(_) => workers += 1,
                Err(error) => warn!(?error, "Could not spawn query worker"),
            }
        }

        if workers == 0 {
            query.work(rpc);
        }

        let mut state = query
            .changed
            .wait_while(query.lock(), |state| !state.is_done())
            .unwrap_or_else(PoisonError::into_inner);

        let mut contacts = state.discovered.clone();
        sort_by_distance(&mut contacts, &target);

        debug!(
            ?target,
            ?kind,
            discovered = contacts.len(),
            found_value = state.value.is_some(),
            "Done query"
        );

        QueryResult {
            contacts,
            value: state.value.take(),
        }
    }

    // === Private Methods ===

    fn lock(&self) -> MutexGuard<'_, QueryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn work(&self, rpc: &Rpc) {
        loop {
            let contact = {
                let mut state = self
                    .changed
                    .wait_while(self.lock(), |state| {
                        !state.is_done() && state.frontier.is_empty()
                    })
                    .unwrap_or_else(PoisonError::into_inner);

                if state.is_done() {
                    // Wake the other workers and the caller.
                    self.changed.notify_all();
                    return;
                }

                state.inflight += 1;
                state.frontier.remove(0)
            };

            let response = match self.kind {
                QueryKind::FindNode => rpc
                    .find_node(&contact, self.target)
                    .map(FindValue::Contacts),
                QueryKind::FindValue => rpc.find_value(&contact, self.target),
            };

            let mut state = self.lock();
            state.inflight -= 1;

            let learned = match response {
                Some(FindValue::Value(value)) => {
                    if state.value.is_none() {
                        debug!(target = ?self.target, from = ?contact, "Query found value");
                        state.value = Some(value);
                    }
                    vec![]
                }
                Some(FindValue::Contacts(contacts)) => state.merge(&self.target, contacts),
                None => vec![],
            };

            drop(state);
            self.changed.notify_all();

            if !learned.is_empty() {
                rpc.node().add_contacts(learned);
            }
        }
    }
}
