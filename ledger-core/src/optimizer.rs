//! Deterministic yield optimizer
//!
//! Greedy knapsack-by-category over eligible rule results:
//!
//! 1. Keep eligible results
//! 2. Order by amount descending, then `rule_id` ascending
//! 3. Take each result whose basis category still has at least `amount` left,
//!    debiting that category; skip the rest (no fallback category)
//!
//! The `rule_id` tie-break decides which of two equal claims wins a budget
//! that fits only one, independent of input order.
//!
//! The optimizer debits a claim's `amount` from its basis dollar-for-dollar.
//! Whether only the rate-attributable portion should be debited is a policy
//! question this module deliberately leaves open.

use crate::{
    metrics::Metrics,
    types::{MinorUnits, RuleResult, DEFAULT_BASIS_CATEGORY},
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Remaining budget per basis category, in minor units
pub type BasisBudget = BTreeMap<String, MinorUnits>;

/// Optimizer output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldPlan {
    /// Chosen results in selection order
    pub chosen_incentives: Vec<RuleResult>,

    /// Sum of chosen amounts
    pub total_yield: MinorUnits,

    /// Budget left per category after selection
    pub remaining_basis: BasisBudget,
}

impl YieldPlan {
    /// Whether nothing was chosen
    pub fn is_empty(&self) -> bool {
        self.chosen_incentives.is_empty()
    }

    /// Identifiers of the chosen rules, in selection order
    pub fn rule_ids(&self) -> Vec<&str> {
        self.chosen_incentives
            .iter()
            .map(|r| r.rule_id.as_str())
            .collect()
    }
}

/// Greedy optimizer
#[derive(Clone)]
pub struct YieldOptimizer {
    default_category: String,
    metrics: Option<Metrics>,
}

impl Default for YieldOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

impl YieldOptimizer {
    /// Optimizer drawing uncategorized rules from `GENERAL`
    pub fn new() -> Self {
        Self::with_default_category(DEFAULT_BASIS_CATEGORY)
    }

    /// Optimizer with a different fallback category
    pub fn with_default_category(category: impl Into<String>) -> Self {
        Self {
            default_category: category.into(),
            metrics: None,
        }
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Category a result draws from
    pub fn category_of<'a>(&'a self, result: &'a RuleResult) -> &'a str {
        result.basis_category().unwrap_or(&self.default_category)
    }

    /// Select a maximal-value subset within the basis budget
    ///
    /// `total_basis` is copied, never modified. A category missing from it has
    /// no budget; zero-amount results always fit.
    pub fn optimize(&self, results: &[RuleResult], total_basis: &BasisBudget) -> YieldPlan {
        let mut eligible: Vec<&RuleResult> = results.iter().filter(|r| r.eligible).collect();
        eligible.sort_by(|a, b| {
            (Reverse(a.amount), a.rule_id.as_str()).cmp(&(Reverse(b.amount), b.rule_id.as_str()))
        });

        let mut remaining = total_basis.clone();
        let mut chosen = Vec::new();
        let mut total_yield: MinorUnits = 0;

        for result in eligible {
            let category = self.category_of(result);

            if result.amount == 0 {
                chosen.push(result.clone());
                continue;
            }

            match remaining.get_mut(category) {
                Some(budget) if *budget >= result.amount => {
                    *budget -= result.amount;
                    total_yield = total_yield.saturating_add(result.amount);
                    tracing::debug!(
                        rule_id = %result.rule_id,
                        amount = result.amount,
                        category,
                        remaining = *budget,
                        "Selected incentive"
                    );
                    chosen.push(result.clone());
                }
                budget => {
                    tracing::debug!(
                        rule_id = %result.rule_id,
                        amount = result.amount,
                        category,
                        available = budget.map_or(0, |b| *b),
                        "Skipped incentive: basis exhausted"
                    );
                }
            }
        }

        tracing::info!(
            chosen = chosen.len(),
            total_yield,
            "Optimized yield plan"
        );
        if let Some(ref metrics) = self.metrics {
            metrics.record_plan_yield(total_yield);
        }

        YieldPlan {
            chosen_incentives: chosen,
            total_yield,
            remaining_basis: remaining,
        }
    }
}

impl std::fmt::Debug for YieldOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YieldOptimizer")
            .field("default_category", &self.default_category)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, amount: MinorUnits) -> RuleResult {
        RuleResult::new(id, true, amount, "")
    }

    fn budget(entries: &[(&str, MinorUnits)]) -> BasisBudget {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_basis_exhaustion() {
        let total_basis = budget(&[("GENERAL", 1000)]);
        let plan = YieldOptimizer::new().optimize(&[rule("R1", 600), rule("R2", 600)], &total_basis);

        assert_eq!(plan.chosen_incentives.len(), 1);
        assert_eq!(plan.total_yield, 600);
        assert_eq!(plan.remaining_basis["GENERAL"], 400);
    }

    #[test]
    fn test_tie_break_independent_of_input_order() {
        let total_basis = budget(&[("GENERAL", 1000)]);
        let optimizer = YieldOptimizer::new();

        let forward = optimizer.optimize(&[rule("R1", 600), rule("R2", 600)], &total_basis);
        let reverse = optimizer.optimize(&[rule("R2", 600), rule("R1", 600)], &total_basis);

        assert_eq!(forward.rule_ids(), vec!["R1"]);
        assert_eq!(reverse.rule_ids(), vec!["R1"]);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_highest_amount_first() {
        let total_basis = budget(&[("GENERAL", 1000)]);
        let plan = YieldOptimizer::new().optimize(
            &[rule("A", 300), rule("B", 900), rule("C", 100)],
            &total_basis,
        );
        // B (900) fits, A (300) does not, C (100) fills the rest
        assert_eq!(plan.rule_ids(), vec!["B", "C"]);
        assert_eq!(plan.total_yield, 1000);
    }

    #[test]
    fn test_ineligible_results_ignored() {
        let total_basis = budget(&[("GENERAL", 10_000)]);
        let mut blocked = rule("BIG", 5000);
        blocked.eligible = false;

        let plan = YieldOptimizer::new().optimize(&[blocked, rule("SMALL", 10)], &total_basis);
        assert_eq!(plan.rule_ids(), vec!["SMALL"]);
    }

    #[test]
    fn test_empty_results() {
        let plan = YieldOptimizer::new().optimize(&[], &budget(&[("GENERAL", 1000)]));
        assert!(plan.is_empty());
        assert_eq!(plan.total_yield, 0);
    }

    #[test]
    fn test_categories_are_independent() {
        let total_basis = budget(&[("EQUIPMENT", 500), ("GENERAL", 100)]);
        let results = [
            rule("EQ1", 400).with_basis_category("EQUIPMENT"),
            rule("EQ2", 200).with_basis_category("EQUIPMENT"),
            rule("GEN", 100),
        ];

        let plan = YieldOptimizer::new().optimize(&results, &total_basis);
        // EQ2 does not fall back to GENERAL once EQUIPMENT is short
        assert_eq!(plan.rule_ids(), vec!["EQ1", "GEN"]);
        assert_eq!(plan.remaining_basis["EQUIPMENT"], 100);
        assert_eq!(plan.remaining_basis["GENERAL"], 0);
    }

    #[test]
    fn test_missing_category_has_zero_budget() {
        let total_basis = budget(&[("GENERAL", 1000)]);
        let plan = YieldOptimizer::new().optimize(
            &[rule("INFRA", 10).with_basis_category("INSTALLATION")],
            &total_basis,
        );
        assert!(plan.is_empty());
        assert!(!plan.remaining_basis.contains_key("INSTALLATION"));
    }

    #[test]
    fn test_zero_amount_always_fits() {
        let plan = YieldOptimizer::new().optimize(
            &[
                rule("UK_MTD", 0),
                rule("ELSEWHERE", 0).with_basis_category("NOWHERE"),
            ],
            &BasisBudget::new(),
        );
        assert_eq!(plan.rule_ids(), vec!["ELSEWHERE", "UK_MTD"]);
        assert_eq!(plan.total_yield, 0);
        assert!(plan.remaining_basis.is_empty());
    }

    #[test]
    fn test_caller_budget_untouched() {
        let total_basis = budget(&[("GENERAL", 1000)]);
        let snapshot = total_basis.clone();
        YieldOptimizer::new().optimize(&[rule("R1", 600)], &total_basis);
        assert_eq!(total_basis, snapshot);
    }

    #[test]
    fn test_custom_default_category() {
        let total_basis = budget(&[("VEHICLE", 1000)]);
        let plan = YieldOptimizer::with_default_category("VEHICLE")
            .optimize(&[rule("R1", 600)], &total_basis);
        assert_eq!(plan.total_yield, 600);
    }

    #[test]
    fn test_metrics_record_yield() {
        let metrics = Metrics::new().unwrap();
        let optimizer = YieldOptimizer::new().with_metrics(metrics.clone());
        optimizer.optimize(&[rule("R1", 600)], &budget(&[("GENERAL", 1000)]));
        assert_eq!(metrics.optimized_yield.get(), 600);
    }
}
