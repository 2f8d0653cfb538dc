//! Core types shared by the ledger, the optimizer and their collaborators
//!
//! All money is carried as integer minor units (e.g. cents). Nothing on the
//! financial path uses floating point.

use crate::{
    canonical::{to_payload, Payload},
    crypto::Digest,
    Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Integer amount in minor currency units
pub type MinorUnits = u64;

/// Trace key carrying the basis category a rule draws from
pub const BASIS_CATEGORY_KEY: &str = "basis_category";

/// Basis bucket used when a rule names none
pub const DEFAULT_BASIS_CATEGORY: &str = "GENERAL";

/// Outcome of one incentive rule evaluation
///
/// Produced by rule calculators outside the core; consumed as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Rule identifier (e.g. `US_45W`)
    pub rule_id: String,

    /// Whether the claim qualifies
    pub eligible: bool,

    /// Claim value in minor units
    pub amount: MinorUnits,

    /// Diagnostic explanation of the computation
    #[serde(default)]
    pub trace: Map<String, Value>,

    /// Legal or source reference
    #[serde(default)]
    pub citation: String,
}

impl RuleResult {
    /// Create a result with an empty trace
    pub fn new(
        rule_id: impl Into<String>,
        eligible: bool,
        amount: MinorUnits,
        citation: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            eligible,
            amount,
            trace: Map::new(),
            citation: citation.into(),
        }
    }

    /// Add one trace field
    pub fn with_trace(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.trace.insert(key.into(), value.into());
        self
    }

    /// Pin the basis category this rule consumes
    pub fn with_basis_category(self, category: impl Into<String>) -> Self {
        self.with_trace(BASIS_CATEGORY_KEY, category.into())
    }

    /// Basis category hint from the trace, if any
    pub fn basis_category(&self) -> Option<&str> {
        self.trace.get(BASIS_CATEGORY_KEY).and_then(Value::as_str)
    }
}

/// Lifecycle of an audited claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditState {
    /// Claim proposed by a rule
    Proposed,
    /// Evidence matched
    Matched,
    /// Evidence and rule verified
    Verified,
    /// Recorded in the ledger
    Committed,
    /// Rejected
    Rejected,
}

impl AuditState {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditState::Proposed => "PROPOSED",
            AuditState::Matched => "MATCHED",
            AuditState::Verified => "VERIFIED",
            AuditState::Committed => "COMMITTED",
            AuditState::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for AuditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anti-double-count key: one (rule, evidence) funding pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdcKey(String);

impl AdcKey {
    /// Create from an arbitrary caller-chosen scope
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for funding `rule_id` from the evidence identified by `evidence_hash`
    pub fn for_claim(rule_id: &str, evidence_hash: &Digest) -> Self {
        Self(format!("{}:{}", rule_id, evidence_hash))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AdcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload committed for one chosen incentive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimPayload {
    /// Record kind
    #[serde(rename = "type")]
    pub kind: String,

    /// Claimed value in minor units
    pub amount: MinorUnits,

    /// Rule funding the claim
    pub rule_id: String,

    /// Evidence the claim is bound to
    pub evidence_hash: Digest,

    /// Fingerprint of the rulepack that produced the result
    pub rulepack_fingerprint: Digest,

    /// Audit state at commit time
    pub state: AuditState,

    /// Legal or source reference
    pub citation: String,
}

impl ClaimPayload {
    /// Record kind for incentive claims
    pub const KIND: &'static str = "INCENTIVE_CLAIM";

    /// Claim for a chosen rule result
    pub fn committed(
        result: &RuleResult,
        evidence_hash: Digest,
        rulepack_fingerprint: Digest,
    ) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            amount: result.amount,
            rule_id: result.rule_id.clone(),
            evidence_hash,
            rulepack_fingerprint,
            state: AuditState::Committed,
            citation: result.citation.clone(),
        }
    }

    /// Anti-double-count key of this claim
    pub fn adc_key(&self) -> AdcKey {
        AdcKey::for_claim(&self.rule_id, &self.evidence_hash)
    }

    /// Ledger payload
    pub fn to_payload(&self) -> Result<Payload> {
        to_payload(self)
    }
}
