//! Directional rule generation from frequent product pairs.
//!
//! Only 2-itemsets become rules. Larger frequent itemsets are kept for
//! reporting but never collapsed into a single antecedent/consequent pair.

use tracing::debug;

use crate::domain::{AssociationRule, ItemId, Itemset, Support, Threshold};
use crate::errors::{InsufficientDataReason, MiningError};
use crate::mining::FrequentItemsets;

#[derive(Clone, Copy, Debug)]
pub struct RuleGenerator {
    min_confidence: Threshold,
}

impl RuleGenerator {
    pub fn new(min_confidence: f64) -> Result<Self, MiningError> {
        Ok(Self { min_confidence: Threshold::new("min_confidence", min_confidence)? })
    }

    pub fn min_confidence(&self) -> Threshold {
        self.min_confidence
    }

    /// Emits `X -> Y` then `Y -> X` for each frequent pair in identifier
    /// order, keeping each direction that reaches the confidence threshold.
    pub fn generate(&self, frequent: &FrequentItemsets) -> Result<Vec<AssociationRule>, MiningError> {
        if frequent.is_empty() {
            return Err(MiningError::InsufficientData(InsufficientDataReason::NoFrequentItemsets));
        }

        let pairs = frequent.of_size(2);
        if pairs.is_empty() {
            return Err(MiningError::InsufficientData(InsufficientDataReason::NoFrequentPairs));
        }

        let mut rules = Vec::with_capacity(pairs.len() * 2);
        let mut rejected = 0usize;
        for pair in pairs {
            let (first, second) = pair_items(pair)?;
            for (antecedent, consequent) in [(first, second), (second, first)] {
                match self.evaluate(frequent, pair.support, antecedent, consequent)? {
                    Some(rule) => rules.push(rule),
                    None => rejected += 1,
                }
            }
        }

        debug!(
            event_name = "mining.rules.generated",
            pairs = pairs.len(),
            rules = rules.len(),
            rejected,
            "association rules generated"
        );

        if rules.is_empty() {
            return Err(MiningError::InsufficientData(InsufficientDataReason::NoConfidentRules));
        }
        Ok(rules)
    }

    fn evaluate(
        &self,
        frequent: &FrequentItemsets,
        joint: Support,
        antecedent: ItemId,
        consequent: ItemId,
    ) -> Result<Option<AssociationRule>, MiningError> {
        let antecedent_support = frequent
            .singleton_support(antecedent)
            .ok_or(MiningError::MissingBaseSupport { item: antecedent })?;
        let consequent_support = frequent
            .singleton_support(consequent)
            .ok_or(MiningError::MissingBaseSupport { item: consequent })?;

        if !self.min_confidence.admits(joint.count, antecedent_support.count) {
            return Ok(None);
        }

        Ok(Some(AssociationRule {
            antecedent,
            consequent,
            support: joint.ratio(),
            confidence: joint.count as f64 / antecedent_support.count as f64,
            lift: lift(joint, antecedent_support, consequent_support),
        }))
    }
}

/// One-shot generation without keeping a [`RuleGenerator`] around.
pub fn generate(
    frequent: &FrequentItemsets,
    min_confidence: f64,
) -> Result<Vec<AssociationRule>, MiningError> {
    RuleGenerator::new(min_confidence)?.generate(frequent)
}

/// (count(A∪C) * N) / (count(A) * count(C)), i.e. confidence / P(C), from counts.
fn lift(joint: Support, antecedent: Support, consequent: Support) -> f64 {
    let numerator = u128::from(joint.count) * u128::from(joint.total);
    let denominator = u128::from(antecedent.count) * u128::from(consequent.count);
    numerator as f64 / denominator as f64
}

fn pair_items(pair: &Itemset) -> Result<(ItemId, ItemId), MiningError> {
    match pair.items.as_slice() {
        [first, second] if first != second => Ok((*first, *second)),
        _ => Err(MiningError::InvalidParameter {
            name: "frequent_itemsets",
            value: format!("{:?}", pair.items),
            reason: "2-itemsets must hold two distinct products",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{generate, RuleGenerator};
    use crate::domain::{AssociationRule, ItemId, Itemset, Support, TransactionSet};
    use crate::errors::{InsufficientDataReason, MiningError};
    use crate::mining::{FrequentItemsets, ItemsetMiner};

    const A: u64 = 1;
    const B: u64 = 2;
    const C: u64 = 3;

    fn scenario_itemsets(min_support: f64) -> FrequentItemsets {
        let transactions = TransactionSet::from_orders(
            [vec![A, B], vec![A, B], vec![A, C], vec![B, C], vec![A, B, C]]
                .into_iter()
                .map(|order| order.into_iter().map(ItemId)),
        )
        .expect("valid transactions");
        ItemsetMiner::new(min_support).expect("valid").mine(&transactions).expect("mined")
    }

    fn find(rules: &[AssociationRule], antecedent: u64, consequent: u64) -> &AssociationRule {
        rules
            .iter()
            .find(|rule| rule.antecedent == ItemId(antecedent) && rule.consequent == ItemId(consequent))
            .expect("rule should be present")
    }

    #[test]
    fn scenario_rules_have_expected_metrics() {
        let rules = generate(&scenario_itemsets(0.2), 0.3).expect("rules");

        let a_to_b = find(&rules, A, B);
        assert!((a_to_b.support - 0.6).abs() < 1e-9);
        assert!((a_to_b.confidence - 0.75).abs() < 1e-9);
        assert!((a_to_b.lift - 0.9375).abs() < 1e-9);

        let b_to_a = find(&rules, B, A);
        assert!((b_to_a.confidence - 0.75).abs() < 1e-9);
        assert!((b_to_a.lift - 0.9375).abs() < 1e-9);

        let a_to_c = find(&rules, A, C);
        assert!((a_to_c.confidence - 0.5).abs() < 1e-9);
        assert_eq!(rules.len(), 6);
    }

    #[test]
    fn metric_identities_hold_for_every_rule() {
        let frequent = scenario_itemsets(0.2);
        let rules = generate(&frequent, 0.1).expect("rules");

        for rule in &rules {
            let a = frequent.singleton_support(rule.antecedent).expect("antecedent").ratio();
            let c = frequent.singleton_support(rule.consequent).expect("consequent").ratio();
            assert!((rule.confidence - rule.support / a).abs() < 1e-9);
            assert!((rule.lift - rule.confidence / c).abs() < 1e-9);
            assert_ne!(rule.antecedent, rule.consequent);
        }
    }

    #[test]
    fn directions_are_filtered_independently() {
        // P(2|1) = 2/4, P(1|2) = 2/2.
        let transactions = TransactionSet::from_orders(
            [vec![1, 2], vec![1, 2], vec![1, 3], vec![1, 3]]
                .into_iter()
                .map(|order| order.into_iter().map(ItemId)),
        )
        .expect("valid");
        let frequent = ItemsetMiner::new(0.5).expect("valid").mine(&transactions).expect("mined");

        let rules = generate(&frequent, 0.8).expect("rules");
        let pairs: Vec<(ItemId, ItemId)> =
            rules.iter().map(|rule| (rule.antecedent, rule.consequent)).collect();
        assert_eq!(pairs, vec![(ItemId(2), ItemId(1)), (ItemId(3), ItemId(1))]);
    }

    #[test]
    fn emission_follows_pair_discovery_order() {
        let rules = generate(&scenario_itemsets(0.2), 0.1).expect("rules");
        let pairs: Vec<(u64, u64)> =
            rules.iter().map(|rule| (rule.antecedent.0, rule.consequent.0)).collect();
        assert_eq!(pairs, vec![(A, B), (B, A), (A, C), (C, A), (B, C), (C, B)]);
    }

    #[test]
    fn generation_is_idempotent() {
        let first = generate(&scenario_itemsets(0.2), 0.3).expect("rules");
        let second = generate(&scenario_itemsets(0.2), 0.3).expect("rules");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_singleton_support_is_reported() {
        let frequent = FrequentItemsets::from_itemsets(
            vec![
                Itemset { items: vec![ItemId(B)], support: Support::new(4, 5) },
                Itemset { items: vec![ItemId(A), ItemId(B)], support: Support::new(3, 5) },
            ],
            5,
        );

        let error = generate(&frequent, 0.1).expect_err("A singleton was discarded");
        assert_eq!(error, MiningError::MissingBaseSupport { item: ItemId(A) });
        assert!(!error.is_user_recoverable());
    }

    #[test]
    fn empty_and_pairless_inputs_fail_with_distinct_reasons() {
        let empty = FrequentItemsets::default();
        assert_eq!(
            generate(&empty, 0.1),
            Err(MiningError::InsufficientData(InsufficientDataReason::NoFrequentItemsets))
        );

        let singles_only = FrequentItemsets::from_itemsets(
            vec![Itemset { items: vec![ItemId(A)], support: Support::new(3, 4) }],
            4,
        );
        assert_eq!(
            generate(&singles_only, 0.1),
            Err(MiningError::InsufficientData(InsufficientDataReason::NoFrequentPairs))
        );
    }

    #[test]
    fn unreachable_confidence_is_insufficient_data() {
        let generator = RuleGenerator::new(1.0).expect("valid");
        let error = generator.generate(&scenario_itemsets(0.2)).expect_err("no rule is certain");
        assert_eq!(error, MiningError::InsufficientData(InsufficientDataReason::NoConfidentRules));
    }

    #[test]
    fn invalid_confidence_is_rejected() {
        for value in [0.0, 1e-30] {
            let error = RuleGenerator::new(value).expect_err("not a usable confidence");
            assert!(matches!(error, MiningError::InvalidParameter { name: "min_confidence", .. }));
        }
    }
}
