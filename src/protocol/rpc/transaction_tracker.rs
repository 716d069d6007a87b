//! Retransmission detection (RFC 5531 section 9, "at-most-once" execution).
//!
//! A call is identified by its xid and the client address. Calls still in
//! progress are always remembered; completed ones for the retention period.
//! A retransmitted call is dropped without a reply, so the client sees the
//! reply of the original call or retries again.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

enum TransactionState {
    InProgress,
    Completed(Instant),
}

pub struct TransactionTracker {
    retention_period: Duration,
    transactions: Mutex<HashMap<(u32, String), TransactionState>>,
}

impl TransactionTracker {
    pub fn new(retention_period: Duration) -> Self {
        Self { retention_period, transactions: Mutex::new(HashMap::new()) }
    }

    /// Returns true if the call was seen before; otherwise records it as in
    /// progress.
    pub fn is_retransmission(&self, xid: u32, client_addr: &str) -> bool {
        let mut transactions = self.transactions.lock().unwrap_or_else(PoisonError::into_inner);
        let retention = self.retention_period;
        transactions.retain(|_, state| match state {
            TransactionState::InProgress => true,
            TransactionState::Completed(at) => at.elapsed() <= retention,
        });
        match transactions.entry((xid, client_addr.to_string())) {
            Entry::Vacant(e) => {
                e.insert(TransactionState::InProgress);
                false
            }
            Entry::Occupied(_) => true,
        }
    }

    pub fn mark_processed(&self, xid: u32, client_addr: &str) {
        let mut transactions = self.transactions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = transactions.get_mut(&(xid, client_addr.to_string())) {
            *state = TransactionState::Completed(Instant::now());
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
