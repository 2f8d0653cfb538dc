//! Versioned rule registry

use crate::{
    rules::{self, RuleFn},
    types::{RuleId, RuleParams},
    Error, Result,
};
use std::collections::BTreeMap;
use yield_ledger_core::{crypto::hash_bytes, Digest, RuleResult};

/// Rulepack: a version plus one calculator per rule
#[derive(Clone)]
pub struct RuleRegistry {
    version: String,
    rules: BTreeMap<RuleId, RuleFn>,
}

impl RuleRegistry {
    /// Empty registry
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            rules: BTreeMap::new(),
        }
    }

    /// Registry with every built-in rule
    pub fn standard(version: impl Into<String>) -> Self {
        let mut registry = Self::new(version);
        registry.register(RuleId::Us45w, rules::us_45w);
        registry.register(RuleId::Us30c, rules::us_30c);
        registry.register(RuleId::UsMacrs2026, rules::us_macrs_2026);
        registry.register(RuleId::UkVat, rules::uk_vat);
        registry.register(RuleId::UkMtd, rules::uk_mtd);
        registry
    }

    /// Install or replace a calculator, returning the previous one
    pub fn register(&mut self, id: RuleId, rule: RuleFn) -> Option<RuleFn> {
        self.rules.insert(id, rule)
    }

    /// Rulepack version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// SHA-256 of the version string
    pub fn fingerprint(&self) -> Digest {
        hash_bytes(self.version.as_bytes())
    }

    /// Registered rule ids in order
    pub fn rule_ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.rules.keys().copied()
    }

    /// Evaluate one rule
    pub fn evaluate(&self, params: &RuleParams) -> Result<RuleResult> {
        let id = params.rule_id();
        let rule = self
            .rules
            .get(&id)
            .ok_or_else(|| Error::UnknownRule(id.to_string()))?;

        let result = rule(params)?;
        tracing::debug!(
            rule_id = %result.rule_id,
            eligible = result.eligible,
            amount = result.amount,
            rulepack = %self.version,
            "Evaluated rule"
        );
        Ok(result)
    }

    /// Evaluate a batch, stopping at the first failure
    pub fn evaluate_all<'a, I>(&self, params: I) -> Result<Vec<RuleResult>>
    where
        I: IntoIterator<Item = &'a RuleParams>,
    {
        params.into_iter().map(|p| self.evaluate(p)).collect()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("version", &self.version)
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}
