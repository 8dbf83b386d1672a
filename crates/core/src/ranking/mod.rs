//! Cart-time ranking of association rules.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::domain::{AssociationRule, ItemId};
use crate::errors::MiningError;

/// Suggestions returned when the caller does not ask for a specific count.
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

/// A ranking request for one in-progress order.
#[derive(Clone, Debug)]
pub struct SuggestionQuery {
    pub cart: HashSet<ItemId>,
    pub limit: usize,
    /// Keep only the best rule per suggested product.
    pub distinct_consequents: bool,
}

impl SuggestionQuery {
    pub fn new(cart: impl IntoIterator<Item = ItemId>) -> Self {
        Self {
            cart: cart.into_iter().collect(),
            limit: DEFAULT_MAX_SUGGESTIONS,
            distinct_consequents: false,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_distinct_consequents(mut self, distinct: bool) -> Self {
        self.distinct_consequents = distinct;
        self
    }

    fn validate(&self) -> Result<(), MiningError> {
        validate_limit(self.limit)
    }
}

fn validate_limit(limit: usize) -> Result<(), MiningError> {
    if limit == 0 {
        return Err(MiningError::InvalidParameter {
            name: "k",
            value: "0".to_owned(),
            reason: "must be greater than zero",
        });
    }
    Ok(())
}

/// Rules grouped by antecedent, each group sorted in ranking order.
///
/// Built once per published rule set; a query merges only the groups of the
/// products in the cart.
#[derive(Clone, Debug, Default)]
pub struct RuleIndex {
    by_antecedent: HashMap<ItemId, Vec<AssociationRule>>,
    rule_count: usize,
}

impl RuleIndex {
    pub fn build(rules: impl IntoIterator<Item = AssociationRule>) -> Self {
        let mut by_antecedent: HashMap<ItemId, Vec<AssociationRule>> = HashMap::new();
        let mut rule_count = 0;
        for rule in rules {
            rule_count += 1;
            by_antecedent.entry(rule.antecedent).or_default().push(rule);
        }
        for group in by_antecedent.values_mut() {
            group.sort_by(AssociationRule::rank_cmp);
        }
        Self { by_antecedent, rule_count }
    }

    pub fn len(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }

    pub fn rules_for(&self, antecedent: ItemId) -> &[AssociationRule] {
        self.by_antecedent.get(&antecedent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every rule in global ranking order.
    pub fn ranked_rules(&self) -> Vec<&AssociationRule> {
        let mut all: Vec<&AssociationRule> = self.by_antecedent.values().flatten().collect();
        all.sort_by(|a, b| a.rank_cmp(b));
        all
    }

    /// Top rules whose antecedent is in the cart and whose consequent is not.
    pub fn suggest(&self, query: &SuggestionQuery) -> Result<Vec<AssociationRule>, MiningError> {
        query.validate()?;
        if query.cart.is_empty() {
            return Ok(Vec::new());
        }

        let mut heap: BinaryHeap<Cursor<'_>> = query
            .cart
            .iter()
            .filter_map(|item| self.by_antecedent.get(item))
            .filter_map(|group| Cursor::start(group))
            .collect();

        let mut suggestions = Vec::with_capacity(query.limit);
        let mut suggested = HashSet::new();
        while suggestions.len() < query.limit {
            let Some(cursor) = heap.pop() else {
                break;
            };
            let rule = cursor.current();
            let accepted = !query.cart.contains(&rule.consequent)
                && (!query.distinct_consequents || suggested.insert(rule.consequent));
            if accepted {
                suggestions.push(rule.clone());
            }
            if let Some(next) = cursor.advance() {
                heap.push(next);
            }
        }

        Ok(suggestions)
    }
}

/// Linear-scan ranking over an arbitrary rule slice; same result as
/// [`RuleIndex::suggest`] without building an index.
pub fn suggest(
    cart: &HashSet<ItemId>,
    rules: &[AssociationRule],
    k: usize,
) -> Result<Vec<AssociationRule>, MiningError> {
    validate_limit(k)?;

    let mut applicable: Vec<&AssociationRule> = rules
        .iter()
        .filter(|rule| cart.contains(&rule.antecedent) && !cart.contains(&rule.consequent))
        .collect();
    applicable.sort_by(|a, b| a.rank_cmp(b));
    Ok(applicable.into_iter().take(k).cloned().collect())
}

/// Position inside one antecedent's sorted rule list. Ordered so that the
/// max-heap pops the best-ranked rule first.
struct Cursor<'a> {
    rules: &'a [AssociationRule],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn start(rules: &'a [AssociationRule]) -> Option<Self> {
        (!rules.is_empty()).then_some(Self { rules, position: 0 })
    }

    fn current(&self) -> &'a AssociationRule {
        &self.rules[self.position]
    }

    fn advance(self) -> Option<Self> {
        let position = self.position + 1;
        (position < self.rules.len()).then_some(Self { rules: self.rules, position })
    }
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cursor<'_> {}

impl PartialOrd for Cursor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.current().rank_cmp(self.current())
    }
}
