//! Incentive Rules for VoltYield
//!
//! Versioned rulepack of pure incentive calculators. Every result carries a
//! citation, and the rulepack version is fingerprinted into committed claims.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod registry;
pub mod rules;
pub mod types;

pub use error::{Error, Result};
pub use registry::RuleRegistry;
pub use rules::RuleFn;
pub use types::{RuleId, RuleParams, DEFAULT_TAX_BRACKET};
