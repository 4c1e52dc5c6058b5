//! Per-client state and the rendezvous primitive.
//!
//! Every command admitted for a client gets a [`Ticket`] carrying a
//! per-client sequence number. The ticket stays in the client's
//! in-flight set until it is dropped, which the worker does after the
//! answer has been sent (or suppressed). RDV waits until no ticket
//! older than its own is in flight; UNREGISTER waits until the set is
//! empty.
//!
//! Locks here are `parking_lot` mutexes held for a few instructions
//! and never across an `.await`.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use babble_core::{ClientKey, Publication, Timeline};
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::Notify;

use crate::types::ConnectionHandle;

/// Follow relationships of one client.
#[derive(Debug, Default)]
pub struct Relations {
    /// Clients that follow this one (receive its publications).
    pub followers: HashSet<ClientKey>,

    /// Clients this one follows.
    pub following: HashSet<ClientKey>,

    /// Set once UNREGISTER starts; no new relationship may be added.
    pub departed: bool,
}

#[derive(Debug, Default)]
struct InFlight {
    next_seq: u64,
    seqs: BTreeSet<u64>,
}

/// State of one logged-in client.
#[derive(Debug)]
pub struct ClientRecord {
    key: ClientKey,
    name: String,
    connection: ConnectionHandle,
    relations: Mutex<Relations>,
    timeline: Mutex<Timeline>,
    in_flight: Mutex<InFlight>,
    completed: Notify,
}

impl ClientRecord {
    pub fn new(
        key: ClientKey,
        name: impl Into<String>,
        connection: ConnectionHandle,
        timeline_capacity: usize,
    ) -> Self {
        ClientRecord {
            key,
            name: name.into(),
            connection,
            relations: Mutex::new(Relations::default()),
            timeline: Mutex::new(Timeline::new(timeline_capacity)),
            in_flight: Mutex::new(InFlight::default()),
            completed: Notify::new(),
        }
    }

    pub fn key(&self) -> ClientKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    // -------------------------------------------------------------------------
    // Pending commands / rendezvous
    // -------------------------------------------------------------------------

    /// Register one more command in flight for this client.
    pub fn admit(self: &Arc<Self>) -> Ticket {
        let seq = {
            let mut in_flight = self.in_flight.lock();
            let seq = in_flight.next_seq;
            in_flight.next_seq += 1;
            in_flight.seqs.insert(seq);
            seq
        };
        Ticket {
            record: Arc::clone(self),
            seq,
        }
    }

    /// Number of commands admitted but not completed yet.
    pub fn pending(&self) -> usize {
        self.in_flight.lock().seqs.len()
    }

    /// Wait until every command admitted before `seq` has completed.
    pub async fn wait_before(&self, seq: u64) {
        self.wait_until(|in_flight| in_flight.seqs.range(..seq).next().is_none())
            .await
    }

    /// Wait until no command is in flight.
    pub async fn wait_idle(&self) {
        self.wait_until(|in_flight| in_flight.seqs.is_empty()).await
    }

    async fn wait_until<F>(&self, done: F)
    where
        F: Fn(&InFlight) -> bool,
    {
        loop {
            let notified = self.completed.notified();
            tokio::pin!(notified);
            // Register before checking so a completion in between is not lost.
            notified.as_mut().enable();

            if self.check(&done) {
                return;
            }
            notified.await;
        }
    }

    fn check<F>(&self, done: &F) -> bool
    where
        F: Fn(&InFlight) -> bool,
    {
        done(&self.in_flight.lock())
    }

    fn complete(&self, seq: u64) {
        self.in_flight.lock().seqs.remove(&seq);
        self.completed.notify_waiters();
    }

    // -------------------------------------------------------------------------
    // Relations / timeline
    // -------------------------------------------------------------------------

    pub fn relations(&self) -> MutexGuard<'_, Relations> {
        self.relations.lock()
    }

    pub fn follower_count(&self) -> usize {
        self.relations.lock().followers.len()
    }

    /// Snapshot of the follower keys.
    pub fn followers(&self) -> Vec<ClientKey> {
        self.relations.lock().followers.iter().copied().collect()
    }

    /// Append a publication to this client's timeline.
    pub fn deliver(&self, publication: Publication) {
        self.timeline.lock().append(publication);
    }

    /// `(total ever delivered, retained items most-recent-first)`.
    pub fn timeline_snapshot(&self) -> (u64, Vec<Publication>) {
        let timeline = self.timeline.lock();
        (timeline.total(), timeline.render())
    }
}

/// Lock the relations of two distinct records, lower key first.
///
/// Guards are returned in argument order.
pub fn lock_pair<'a>(
    a: &'a ClientRecord,
    b: &'a ClientRecord,
) -> (MutexGuard<'a, Relations>, MutexGuard<'a, Relations>) {
    debug_assert_ne!(a.key, b.key, "lock_pair on the same record");
    if a.key < b.key {
        let ga = a.relations.lock();
        let gb = b.relations.lock();
        (ga, gb)
    } else {
        let gb = b.relations.lock();
        let ga = a.relations.lock();
        (ga, gb)
    }
}

/// Proof that a command is in flight for a client.
///
/// Dropping the ticket marks the command completed and wakes any
/// rendezvous waiting on this client.
#[derive(Debug)]
pub struct Ticket {
    record: Arc<ClientRecord>,
    seq: u64,
}

impl Ticket {
    pub fn record(&self) -> &Arc<ClientRecord> {
        &self.record
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.record.complete(self.seq);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::types::{ConnectionId, OutboundRx};

    pub(crate) fn test_connection() -> (ConnectionHandle, OutboundRx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(ConnectionId(0), tx), rx)
    }

    pub(crate) fn test_record(name: &str) -> (Arc<ClientRecord>, OutboundRx) {
        let (conn, rx) = test_connection();
        let record = ClientRecord::new(ClientKey::from_name(name), name, conn, 4);
        (Arc::new(record), rx)
    }

    #[tokio::test]
    async fn tickets_count_pending_commands() {
        let (record, _rx) = test_record("alice");
        let t1 = record.admit();
        let t2 = record.admit();
        assert_eq!(record.pending(), 2);
        assert!(t1.seq() < t2.seq());

        drop(t1);
        assert_eq!(record.pending(), 1);
        drop(t2);
        assert_eq!(record.pending(), 0);
    }

    #[tokio::test]
    async fn rendezvous_ignores_later_commands() {
        let (record, _rx) = test_record("alice");
        let rdv = record.admit();
        let _later = record.admit();

        timeout(Duration::from_millis(100), record.wait_before(rdv.seq()))
            .await
            .expect("nothing was admitted before the rendezvous");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rendezvous_waits_for_earlier_commands() {
        let (record, _rx) = test_record("alice");
        let earlier = record.admit();
        let rdv = record.admit();

        let waiter = {
            let record = Arc::clone(&record);
            let seq = rdv.seq();
            tokio::spawn(async move { record.wait_before(seq).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "rendezvous returned with work in flight");

        drop(earlier);
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("rendezvous not released")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_idle_needs_every_ticket() {
        let (record, _rx) = test_record("bob");
        let tickets: Vec<_> = (0..5).map(|_| record.admit()).collect();

        let waiter = {
            let record = Arc::clone(&record);
            tokio::spawn(async move { record.wait_idle().await })
        };

        for t in tickets {
            tokio::time::sleep(Duration::from_millis(5)).await;
            drop(t);
        }
        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(record.pending(), 0);
    }

    #[test]
    fn lock_pair_returns_guards_in_argument_order() {
        let (a, _ra) = test_record("alice");
        let (b, _rb) = test_record("bob");

        {
            let (mut ga, mut gb) = lock_pair(&b, &a);
            ga.followers.insert(a.key());
            gb.following.insert(b.key());
        }
        assert_eq!(b.followers(), vec![a.key()]);
        assert!(a.relations().following.contains(&b.key()));
    }
}
