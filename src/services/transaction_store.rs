use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{error, info, warn};

use crate::models::payment::{Transaction, TransactionState};

/// In-memory registry of payment transactions keyed by order number.
#[derive(Default)]
pub struct TransactionStore {
    transactions: DashMap<String, Transaction>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new transaction. Returns `false` if the order number is taken.
    pub fn create(&self, transaction: Transaction) -> bool {
        match self.transactions.entry(transaction.order_number.clone()) {
            Entry::Occupied(_) => {
                error!(
                    "Transaction {} already exists",
                    transaction.order_number
                );
                false
            }
            Entry::Vacant(entry) => {
                info!(
                    "Transaction {} started for patron {}",
                    transaction.order_number, transaction.patron_id
                );
                entry.insert(transaction);
                true
            }
        }
    }

    pub fn get(&self, order_number: &str) -> Option<Transaction> {
        self.transactions.get(order_number).map(|entry| entry.clone())
    }

    pub fn is_in_progress(&self, order_number: &str) -> bool {
        self.transactions
            .get(order_number)
            .map(|entry| entry.state == TransactionState::InProgress)
            .unwrap_or(false)
    }

    /// Marks an in-progress transaction paid. Returns `false` if it was
    /// unknown or already finished.
    pub fn set_paid(&self, order_number: &str, paid_at: &str) -> bool {
        let paid_at = if paid_at.is_empty() {
            Utc::now().timestamp().to_string()
        } else {
            paid_at.to_string()
        };
        self.finish(order_number, |t| {
            t.state = TransactionState::Paid;
            t.paid_at = Some(paid_at);
        })
    }

    pub fn set_cancelled(&self, order_number: &str) -> bool {
        self.finish(order_number, |t| t.state = TransactionState::Cancelled)
    }

    pub fn set_failed(&self, order_number: &str, reason: &str) -> bool {
        self.finish(order_number, |t| {
            t.state = TransactionState::Failed(reason.to_string())
        })
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn count_in_state(&self, state: &TransactionState) -> usize {
        self.transactions
            .iter()
            .filter(|entry| std::mem::discriminant(&entry.state) == std::mem::discriminant(state))
            .count()
    }

    /// Applies a final state while holding the entry lock, so only the first
    /// of several concurrent callbacks can move a transaction out of progress.
    fn finish(&self, order_number: &str, apply: impl FnOnce(&mut Transaction)) -> bool {
        match self.transactions.get_mut(order_number) {
            Some(mut entry) if entry.state == TransactionState::InProgress => {
                apply(entry.value_mut());
                true
            }
            Some(entry) => {
                warn!(
                    "Transaction {} already finished as {:?}",
                    order_number, entry.state
                );
                false
            }
            None => {
                error!("Error updating transaction {}: not found", order_number);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(order_number: &str) -> Transaction {
        Transaction {
            order_number: order_number.to_string(),
            driver: "Voyager".to_string(),
            patron_id: "patron".to_string(),
            amount: 300,
            transaction_fee: 50,
            currency: "EUR".to_string(),
            fines: Vec::new(),
            state: TransactionState::InProgress,
            created_at: Utc::now(),
            paid_at: None,
        }
    }

    #[test]
    fn test_create_rejects_duplicates() {
        let store = TransactionStore::new();
        assert!(store.create(transaction("a")));
        assert!(!store.create(transaction("a")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_state_transitions() {
        let store = TransactionStore::new();
        store.create(transaction("a"));
        assert!(store.is_in_progress("a"));

        assert!(store.set_paid("a", "20240101"));
        let paid = store.get("a").unwrap();
        assert_eq!(paid.state, TransactionState::Paid);
        assert_eq!(paid.paid_at.as_deref(), Some("20240101"));
        assert!(!store.is_in_progress("a"));

        store.create(transaction("b"));
        store.set_failed("b", "invalid checksum");
        assert_eq!(
            store.get("b").unwrap().state,
            TransactionState::Failed("invalid checksum".to_string())
        );
        assert_eq!(
            store.count_in_state(&TransactionState::Failed(String::new())),
            1
        );

        assert!(!store.set_cancelled("missing"));
        assert!(!store.is_in_progress("missing"));
    }

    #[test]
    fn test_finished_transaction_is_not_overwritten() {
        let store = TransactionStore::new();
        store.create(transaction("a"));
        assert!(store.set_paid("a", "20240101"));

        assert!(!store.set_failed("a", "invalid checksum"));
        assert!(!store.set_cancelled("a"));
        assert!(!store.set_paid("a", "20240102"));

        let paid = store.get("a").unwrap();
        assert_eq!(paid.state, TransactionState::Paid);
        assert_eq!(paid.paid_at.as_deref(), Some("20240101"));
    }

    #[test]
    fn test_only_one_concurrent_transition_applies() {
        let store = TransactionStore::new();
        for round in 0..200 {
            let order = format!("order-{round}");
            store.create(transaction(&order));
            let barrier = std::sync::Barrier::new(2);

            let (paid, failed) = std::thread::scope(|s| {
                let paid = s.spawn(|| {
                    barrier.wait();
                    store.set_paid(&order, "")
                });
                let failed = s.spawn(|| {
                    barrier.wait();
                    store.set_failed(&order, "invalid checksum")
                });
                (paid.join().unwrap(), failed.join().unwrap())
            });

            assert!(paid ^ failed);
            let state = store.get(&order).unwrap().state;
            if paid {
                assert_eq!(state, TransactionState::Paid);
            } else {
                assert!(matches!(state, TransactionState::Failed(_)));
            }
        }
    }
}
