//! Rule calculators
//!
//! Each calculator is a pure function of its parameters. Rates are applied in
//! `Decimal` and truncated toward zero to whole minor units.

use crate::{
    types::{RuleId, RuleParams},
    Error, Result,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use yield_ledger_core::{MinorUnits, RuleResult};

/// Calculator signature stored in the registry
pub type RuleFn = fn(&RuleParams) -> Result<RuleResult>;

/// 45W: credit rate for battery electric vehicles
pub const US_45W_EV_RATE: Decimal = dec!(0.30);
/// 45W: credit rate for other qualifying vehicles
pub const US_45W_HYBRID_RATE: Decimal = dec!(0.15);
/// 45W: weight class boundary
pub const US_45W_HEAVY_LBS: u32 = 14_000;
/// 45W: cap below the boundary ($7,500)
pub const US_45W_LIGHT_CAP: MinorUnits = 750_000;
/// 45W: cap at or above the boundary ($40,000)
pub const US_45W_HEAVY_CAP: MinorUnits = 4_000_000;

/// 30C: flat credit ($1,000)
pub const US_30C_AMOUNT: MinorUnits = 100_000;
/// 30C: GEOID length of a census tract
pub const US_30C_GEOID_LEN: usize = 11;

/// UK standard VAT rate
pub const UK_VAT_RATE: Decimal = dec!(0.20);

const DATE_FORMAT: &str = "%Y-%m-%d";

fn us_30c_sunset() -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(2026, 6, 30)
        .ok_or_else(|| Error::InvalidInput("30C sunset date".to_string()))
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("{} {:?}: {}", field, value, e)))
}

/// Apply a rate and truncate to minor units
fn apply_rate(amount: MinorUnits, rate: Decimal) -> Result<MinorUnits> {
    Decimal::from(amount)
        .checked_mul(rate)
        .and_then(|v| v.trunc().to_u64())
        .ok_or_else(|| Error::InvalidInput(format!("{} × {} out of range", amount, rate)))
}

fn mismatch(rule: RuleId, params: &RuleParams) -> Error {
    Error::ParamsMismatch {
        rule: rule.to_string(),
        params: params.rule_id().to_string(),
    }
}

/// US 45W commercial clean vehicle credit
pub fn us_45w(params: &RuleParams) -> Result<RuleResult> {
    let RuleParams::Us45w {
        asset_cost_minor,
        vehicle_weight_lbs,
        is_electric,
    } = params
    else {
        return Err(mismatch(RuleId::Us45w, params));
    };

    let rate = if *is_electric {
        US_45W_EV_RATE
    } else {
        US_45W_HYBRID_RATE
    };
    let uncapped = apply_rate(*asset_cost_minor, rate)?;
    let cap = if *vehicle_weight_lbs >= US_45W_HEAVY_LBS {
        US_45W_HEAVY_CAP
    } else {
        US_45W_LIGHT_CAP
    };

    Ok(
        RuleResult::new(RuleId::Us45w.as_str(), true, uncapped.min(cap), "26 U.S.C. § 45W")
            .with_trace("weight_lbs", *vehicle_weight_lbs)
            .with_trace("rate", rate.to_string())
            .with_trace("uncapped_amount", uncapped)
            .with_trace("cap", cap),
    )
}

/// US 30C alternative fuel refueling property credit
pub fn us_30c(params: &RuleParams) -> Result<RuleResult> {
    let RuleParams::Us30c {
        tract_geoid,
        service_date,
        is_eligible_tract,
    } = params
    else {
        return Err(mismatch(RuleId::Us30c, params));
    };

    let placed = parse_date("service_date", service_date)?;
    let eligible = tract_geoid.chars().count() == US_30C_GEOID_LEN
        && placed <= us_30c_sunset()?
        && *is_eligible_tract;

    Ok(RuleResult::new(
        RuleId::Us30c.as_str(),
        eligible,
        if eligible { US_30C_AMOUNT } else { 0 },
        "26 U.S.C. § 30C",
    )
    .with_trace("geoid", tract_geoid.as_str())
    .with_trace("date", service_date.as_str()))
}

/// Bonus depreciation percentage by placed-in-service year
pub fn macrs_bonus_percent(year: i32) -> u64 {
    match year {
        2024 => 60,
        2025 => 40,
        2026 => 20,
        _ => 0,
    }
}

/// US MACRS bonus depreciation tax shield
pub fn us_macrs_2026(params: &RuleParams) -> Result<RuleResult> {
    let RuleParams::UsMacrs2026 {
        asset_cost_minor,
        placed_in_service_date,
        tax_bracket,
    } = params
    else {
        return Err(mismatch(RuleId::UsMacrs2026, params));
    };

    if tax_bracket.is_sign_negative() || *tax_bracket > Decimal::ONE {
        return Err(Error::InvalidInput(format!(
            "tax_bracket {} outside [0, 1]",
            tax_bracket
        )));
    }

    let year = parse_date("placed_in_service_date", placed_in_service_date)?.year();
    let percent = macrs_bonus_percent(year);
    let bonus_basis = asset_cost_minor
        .checked_mul(percent)
        .map(|v| v / 100)
        .ok_or_else(|| Error::InvalidInput(format!("asset cost {} too large", asset_cost_minor)))?;
    let tax_savings = apply_rate(bonus_basis, *tax_bracket)?;

    Ok(RuleResult::new(
        RuleId::UsMacrs2026.as_str(),
        true,
        tax_savings,
        "26 U.S.C. § 168(k)",
    )
    .with_trace("bonus_rate", (Decimal::from(percent) / dec!(100)).to_string())
    .with_trace("bonus_basis", bonus_basis)
    .with_trace("tax_bracket", tax_bracket.to_string()))
}

/// UK input VAT recovery, gated on unbroken digital links
pub fn uk_vat(params: &RuleParams) -> Result<RuleResult> {
    let RuleParams::UkVat {
        net_amount_minor,
        unbroken_lineage,
    } = params
    else {
        return Err(mismatch(RuleId::UkVat, params));
    };

    let vat = apply_rate(*net_amount_minor, UK_VAT_RATE)?;
    let eligible = *unbroken_lineage;

    Ok(RuleResult::new(
        RuleId::UkVat.as_str(),
        eligible,
        if eligible { vat } else { 0 },
        "VATA 1994 s.24-26",
    )
    .with_trace("unbroken_lineage", eligible)
    .with_trace("basis_amount", *net_amount_minor)
    .with_trace("calculated_vat", vat))
}

/// UK Making Tax Digital compliance gate (carries no value)
pub fn uk_mtd(params: &RuleParams) -> Result<RuleResult> {
    let RuleParams::UkMtd {
        digital_links_compliant,
    } = params
    else {
        return Err(mismatch(RuleId::UkMtd, params));
    };

    Ok(RuleResult::new(
        RuleId::UkMtd.as_str(),
        *digital_links_compliant,
        0,
        "VAT Notice 700/22",
    )
    .with_trace("compliant", *digital_links_compliant))
}
