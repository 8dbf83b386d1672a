use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::item::ItemId;

/// Directional one-to-one association rule: buying `antecedent` suggests
/// `consequent`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedent: ItemId,
    pub consequent: ItemId,
    /// Fraction of transactions containing both products.
    pub support: f64,
    /// P(consequent | antecedent).
    pub confidence: f64,
    /// confidence / P(consequent); above 1 means positive correlation.
    pub lift: f64,
}

impl AssociationRule {
    /// `"If <antecedent> -> Then <consequent>"` using raw identifiers.
    pub fn label(&self) -> String {
        self.label_with(|item| item.to_string())
    }

    /// Same as [`label`](Self::label) with caller-supplied product names.
    pub fn label_with(&self, mut name_of: impl FnMut(ItemId) -> String) -> String {
        format!("If {} -> Then {}", name_of(self.antecedent), name_of(self.consequent))
    }

    /// Ranking order: confidence desc, lift desc, then (antecedent, consequent)
    /// asc. Total over finite metrics.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .confidence
            .total_cmp(&self.confidence)
            .then_with(|| other.lift.total_cmp(&self.lift))
            .then_with(|| self.antecedent.cmp(&other.antecedent))
            .then_with(|| self.consequent.cmp(&other.consequent))
    }
}

impl fmt::Display for AssociationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (support={:.4}, confidence={:.4}, lift={:.4})",
            self.label(),
            self.support,
            self.confidence,
            self.lift
        )
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::AssociationRule;
    use crate::domain::item::ItemId;

    fn rule(antecedent: u64, consequent: u64, confidence: f64, lift: f64) -> AssociationRule {
        AssociationRule {
            antecedent: ItemId(antecedent),
            consequent: ItemId(consequent),
            support: 0.1,
            confidence,
            lift,
        }
    }

    #[test]
    fn label_matches_operator_format() {
        let rule = rule(12, 40, 0.5, 1.2);
        assert_eq!(rule.label(), "If 12 -> Then 40");
        assert_eq!(
            rule.label_with(|item| format!("product-{item}")),
            "If product-12 -> Then product-40"
        );
    }

    #[test]
    fn rank_cmp_breaks_ties_by_lift_then_identifiers() {
        let high = rule(1, 2, 0.9, 1.0);
        let tied_better_lift = rule(5, 6, 0.8, 1.4);
        let tied_low_id = rule(1, 3, 0.8, 1.2);
        let tied_high_id = rule(2, 3, 0.8, 1.2);

        assert_eq!(high.rank_cmp(&tied_better_lift), Ordering::Less);
        assert_eq!(tied_better_lift.rank_cmp(&tied_low_id), Ordering::Less);
        assert_eq!(tied_low_id.rank_cmp(&tied_high_id), Ordering::Less);
        assert_eq!(tied_low_id.rank_cmp(&tied_low_id.clone()), Ordering::Equal);
    }

    #[test]
    fn serializes_item_ids_as_plain_integers() {
        let value = serde_json::to_value(rule(12, 40, 0.5, 1.25)).expect("serializable");
        assert_eq!(value["antecedent"], serde_json::json!(12));
        assert_eq!(value["consequent"], serde_json::json!(40));
        assert_eq!(value["lift"], serde_json::json!(1.25));
    }
}
