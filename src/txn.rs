//! Transaction table correlating outbound requests with their replies
//! (spec §3 "Transaction", §4.D).

use std::collections::HashMap;
use std::sync::Arc;

use crate::peer::PeerState;

/// Invoked when a transaction completes, with `None` in place of the
/// source's null-`cmd` cancellation signal (spec §5 "Cancellation").
pub type CompletionCallback = Box<dyn FnMut(Option<(&PeerState, i32)>) + Send>;

/// A single in-flight outbound request (spec §3 "Transaction").
pub struct Transaction {
    /// The monotonically increasing number assigned by
    /// [`TransactionTable::insert`].
    pub number: u64,
    /// The peer this transaction is bound to.
    pub peer: Arc<PeerState>,
    /// Invoked once when the transaction completes or is cancelled.
    pub on_complete: Option<CompletionCallback>,
}

/// Issues monotonically increasing transaction numbers and correlates
/// replies with their originating request (spec §4.D, §5
/// `transaction_lock`).
#[derive(Default)]
pub struct TransactionTable {
    next: u64,
    live: HashMap<u64, Transaction>,
}

impl TransactionTable {
    /// Create an empty table. Transaction numbers start at 1; 0 is never
    /// issued so it can serve as a sentinel in callers that need one.
    #[must_use]
    pub fn new() -> Self { Self { next: 1, live: HashMap::new() } }

    /// Assign the next transaction number to `txn` and insert it.
    ///
    /// # Panics
    /// Does not panic; `number` is overwritten with the assigned value
    /// regardless of what the caller passed in.
    pub fn insert(&mut self, mut txn: Transaction) -> u64 {
        let number = self.next;
        self.next += 1;
        txn.number = number;
        self.live.insert(number, txn);
        number
    }

    /// Look up the transaction recorded under `number`.
    #[must_use]
    pub fn lookup(&self, number: u64) -> Option<&Transaction> { self.live.get(&number) }

    /// Remove and return the transaction recorded under `number`, running
    /// its completion callback with the given result if present.
    pub fn destroy(&mut self, number: u64, result: Option<(&PeerState, i32)>) {
        if let Some(mut txn) = self.live.remove(&number) {
            if let Some(mut cb) = txn.on_complete.take() {
                cb(result);
            }
        }
    }

    /// Number of transactions currently tracked.
    #[must_use]
    pub fn len(&self) -> usize { self.live.len() }

    /// Whether the table currently tracks no transactions.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.live.is_empty() }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Mutex as AsyncMutex;

    use super::*;
    use crate::oid::Oid;

    fn fake_peer() -> Arc<PeerState> {
        Arc::new(PeerState {
            id: Oid::ZERO,
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9000),
            send_lock: AsyncMutex::new(None),
            recv_timeout: Duration::from_secs(1),
        })
    }

    fn txn_without_callback() -> Transaction {
        Transaction { number: 0, peer: fake_peer(), on_complete: None }
    }

    #[test]
    fn numbers_are_unique_and_increasing() {
        let mut table = TransactionTable::new();
        let a = table.insert(txn_without_callback());
        let b = table.insert(txn_without_callback());
        let c = table.insert(txn_without_callback());
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn lookup_finds_inserted_transaction() {
        let mut table = TransactionTable::new();
        let number = table.insert(txn_without_callback());
        assert!(table.lookup(number).is_some());
        assert!(table.lookup(number + 100).is_none());
    }

    #[test]
    fn destroy_invokes_callback_once() {
        let mut table = TransactionTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let txn = Transaction {
            number: 0,
            peer: fake_peer(),
            on_complete: Some(Box::new(move |_result| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            })),
        };
        let number = table.insert(txn);
        table.destroy(number, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(table.lookup(number).is_none());
    }

    #[test]
    fn destroying_unknown_number_is_a_no_op() {
        let mut table = TransactionTable::new();
        table.destroy(42, None);
        assert!(table.is_empty());
    }
}
