pub mod item;
pub mod itemset;
pub mod rule;
pub mod support;
pub mod transaction;

pub use item::ItemId;
pub use itemset::Itemset;
pub use rule::AssociationRule;
pub use support::{Support, Threshold};
pub use transaction::{Transaction, TransactionSet};
