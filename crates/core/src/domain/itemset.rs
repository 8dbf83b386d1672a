use serde::{Deserialize, Serialize};

use crate::domain::item::ItemId;
use crate::domain::support::Support;

/// A frequent set of co-purchased items. Items are sorted ascending.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Itemset {
    pub items: Vec<ItemId>,
    pub support: Support,
}

impl Itemset {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ratio(&self) -> f64 {
        self.support.ratio()
    }

    /// Every subset obtained by dropping exactly one item, in ascending
    /// order of the dropped position.
    pub fn subsets_without_one(items: &[ItemId]) -> impl Iterator<Item = Vec<ItemId>> + '_ {
        (0..items.len()).map(move |skip| {
            items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| (index != skip).then_some(*item))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Itemset;
    use crate::domain::item::ItemId;

    #[test]
    fn subsets_without_one_drops_each_position() {
        let items = vec![ItemId(1), ItemId(2), ItemId(3)];
        let subsets: Vec<Vec<ItemId>> = Itemset::subsets_without_one(&items).collect();

        assert_eq!(
            subsets,
            vec![
                vec![ItemId(2), ItemId(3)],
                vec![ItemId(1), ItemId(3)],
                vec![ItemId(1), ItemId(2)],
            ]
        );
    }
}
