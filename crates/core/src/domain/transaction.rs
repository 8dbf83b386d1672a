use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::item::ItemId;
use crate::errors::{InsufficientDataReason, MiningError};

/// One confirmed order reduced to the distinct products it contained.
///
/// Items are kept sorted so subset checks during support counting are a
/// linear merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    items: Vec<ItemId>,
}

impl Transaction {
    /// Collapses duplicates. Returns `None` for an empty order.
    pub fn new(items: impl IntoIterator<Item = ItemId>) -> Option<Self> {
        let items: Vec<ItemId> = items.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        (!items.is_empty()).then_some(Self { items })
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// An order with a single product carries no co-purchase signal.
    pub fn has_cross_sell_signal(&self) -> bool {
        self.items.len() >= 2
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.items.binary_search(&item).is_ok()
    }

    /// `sorted_items` must be sorted ascending and free of duplicates.
    pub fn contains_all(&self, sorted_items: &[ItemId]) -> bool {
        if sorted_items.len() > self.items.len() {
            return false;
        }

        let mut own = self.items.iter();
        'outer: for wanted in sorted_items {
            for candidate in own.by_ref() {
                if candidate == wanted {
                    continue 'outer;
                }
                if candidate > wanted {
                    return false;
                }
            }
            return false;
        }
        true
    }
}

/// The filtered input of one mining run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionSet {
    transactions: Vec<Transaction>,
    dropped_single_item: usize,
}

impl TransactionSet {
    /// Builds the mining input from raw orders, dropping empty and single-item
    /// orders.
    pub fn from_orders<I, O>(orders: I) -> Result<Self, MiningError>
    where
        I: IntoIterator<Item = O>,
        O: IntoIterator<Item = ItemId>,
    {
        let mut seen_any = false;
        let mut dropped_single_item = 0;
        let mut transactions = Vec::new();

        for order in orders {
            seen_any = true;
            match Transaction::new(order) {
                Some(transaction) if transaction.has_cross_sell_signal() => {
                    transactions.push(transaction)
                }
                _ => dropped_single_item += 1,
            }
        }

        if !seen_any {
            return Err(MiningError::InsufficientData(InsufficientDataReason::NoTransactions));
        }
        if transactions.is_empty() {
            return Err(MiningError::InsufficientData(
                InsufficientDataReason::NoMultiItemTransactions,
            ));
        }

        Ok(Self { transactions, dropped_single_item })
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn dropped_single_item(&self) -> usize {
        self.dropped_single_item
    }
}
