//! Rule identifiers and per-rule inputs

use crate::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use yield_ledger_core::MinorUnits;

/// Incentive rule identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleId {
    /// US Section 45W commercial clean vehicle credit
    #[serde(rename = "US_45W")]
    Us45w,
    /// US Section 30C refueling property credit
    #[serde(rename = "US_30C")]
    Us30c,
    /// US MACRS bonus depreciation, 2026 schedule
    #[serde(rename = "US_MACRS_2026")]
    UsMacrs2026,
    /// UK input VAT recovery
    #[serde(rename = "UK_VAT")]
    UkVat,
    /// UK Making Tax Digital link check
    #[serde(rename = "UK_MTD")]
    UkMtd,
}

impl RuleId {
    /// All rules in registry order
    pub const ALL: [RuleId; 5] = [
        RuleId::Us45w,
        RuleId::Us30c,
        RuleId::UsMacrs2026,
        RuleId::UkVat,
        RuleId::UkMtd,
    ];

    /// Wire identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::Us45w => "US_45W",
            RuleId::Us30c => "US_30C",
            RuleId::UsMacrs2026 => "US_MACRS_2026",
            RuleId::UkVat => "UK_VAT",
            RuleId::UkMtd => "UK_MTD",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RuleId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| Error::UnknownRule(s.to_string()))
    }
}

/// Default marginal tax bracket for depreciation shields
pub const DEFAULT_TAX_BRACKET: Decimal = dec!(0.21);

fn default_tax_bracket() -> Decimal {
    DEFAULT_TAX_BRACKET
}

fn default_true() -> bool {
    true
}

/// Inputs for one rule evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule")]
pub enum RuleParams {
    /// 45W inputs
    #[serde(rename = "US_45W")]
    Us45w {
        /// Asset cost in minor units
        asset_cost_minor: MinorUnits,
        /// Gross vehicle weight rating
        vehicle_weight_lbs: u32,
        /// Battery electric (otherwise hybrid rate)
        #[serde(default = "default_true")]
        is_electric: bool,
    },

    /// 30C inputs
    #[serde(rename = "US_30C")]
    Us30c {
        /// 11-digit census tract GEOID
        tract_geoid: String,
        /// Placed-in-service date, `YYYY-MM-DD`
        service_date: String,
        /// Tract is an eligible census tract
        is_eligible_tract: bool,
    },

    /// MACRS inputs
    #[serde(rename = "US_MACRS_2026")]
    UsMacrs2026 {
        /// Asset cost in minor units
        asset_cost_minor: MinorUnits,
        /// Placed-in-service date, `YYYY-MM-DD`
        placed_in_service_date: String,
        /// Marginal tax bracket as a fraction
        #[serde(default = "default_tax_bracket")]
        tax_bracket: Decimal,
    },

    /// UK VAT inputs
    #[serde(rename = "UK_VAT")]
    UkVat {
        /// Net purchase amount in minor units
        net_amount_minor: MinorUnits,
        /// Digital links unbroken from source to return
        unbroken_lineage: bool,
    },

    /// UK MTD inputs
    #[serde(rename = "UK_MTD")]
    UkMtd {
        /// Digital links compliant
        digital_links_compliant: bool,
    },
}

impl RuleParams {
    /// Rule these parameters are for
    pub fn rule_id(&self) -> RuleId {
        match self {
            RuleParams::Us45w { .. } => RuleId::Us45w,
            RuleParams::Us30c { .. } => RuleId::Us30c,
            RuleParams::UsMacrs2026 { .. } => RuleId::UsMacrs2026,
            RuleParams::UkVat { .. } => RuleId::UkVat,
            RuleParams::UkMtd { .. } => RuleId::UkMtd,
        }
    }
}
