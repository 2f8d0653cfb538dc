// Demo Orchestrator - runs one receipt through the full claim pipeline
// stitch → evaluate → optimize → commit → verify → compliance report

use anyhow::Context;
use chrono::{DateTime, Utc};
use colored::Colorize;
use evidence_matcher::{Evidence, EvidenceMatcher, GeoPoint, Receipt, ReceiptStitcher, TelemetryEvent};
use incentive_rules::{RuleParams, RuleRegistry, DEFAULT_TAX_BRACKET};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use yield_ledger_core::{
    actor::{spawn_ledger_actor, LedgerHandle},
    audit_log::{self, AuditLogWriter},
    metrics::Metrics,
    BasisBudget, ClaimPayload, Config, Digest, ForensicLedger, MinorUnits, RuleResult,
    YieldOptimizer, YieldPlan,
};

/// What happened to one chosen incentive at commit time
#[derive(Debug, Clone, PartialEq)]
enum CommitOutcome {
    /// Appended in this run
    Committed { chain_hash: Digest },
    /// Same idempotency key already on the ledger
    AlreadyRecorded { chain_hash: Digest },
    /// Same rule already claimed on this evidence under another key
    Blocked { reason: String },
}

#[derive(Debug)]
struct DemoReport {
    evidence: Evidence,
    evaluated: Vec<RuleResult>,
    plan: YieldPlan,
    outcomes: Vec<(RuleResult, CommitOutcome)>,
    chain_length: usize,
    chain_head: Option<Digest>,
    rulepack_version: String,
}

struct Scenario {
    receipt: Receipt,
    telemetry: Vec<TelemetryEvent>,
    basis: BasisBudget,
}

fn timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    s.parse().with_context(|| format!("bad scenario timestamp {}", s))
}

fn charging_event(asset_id: &str, at: GeoPoint, ts: &str) -> anyhow::Result<TelemetryEvent> {
    Ok(TelemetryEvent {
        asset_id: asset_id.to_string(),
        timestamp: timestamp(ts)?,
        location: at,
        kwh_delivered: 50_000,
        status: "CHARGING".to_string(),
        unbroken_lineage: true,
        metadata: Default::default(),
    })
}

fn fleet_depot_scenario() -> anyhow::Result<Scenario> {
    let depot = GeoPoint::new(34.05, -118.24);

    let telemetry = vec![
        charging_event("V-001", depot, "2026-01-01T12:00:00Z")?,
        charging_event("V-002", GeoPoint::new(34.06, -118.25), "2026-01-01T12:03:00Z")?,
        charging_event("V-003", depot, "2026-01-01T08:30:00Z")?,
    ];

    let receipt = Receipt {
        receipt_id: "REC-99".to_string(),
        vendor: "ChargePoint".to_string(),
        amount_minor: 1_500,
        currency: "USD".to_string(),
        timestamp: timestamp("2026-01-01T12:05:00Z")?,
        location: Some(depot),
        confidence: 0.97,
    };

    let basis: BasisBudget = [
        ("EQUIPMENT".to_string(), 14_000_000),
        ("INSTALLATION".to_string(), 10_000_000),
        ("GENERAL".to_string(), 1_000_000),
    ]
    .into_iter()
    .collect();

    Ok(Scenario {
        receipt,
        telemetry,
        basis,
    })
}

/// Rule inputs for the asset the receipt was stitched to
fn rule_inputs(receipt: &Receipt, event: &TelemetryEvent) -> Vec<(RuleParams, Option<&'static str>)> {
    vec![
        (
            RuleParams::Us45w {
                asset_cost_minor: 14_000_000,
                vehicle_weight_lbs: 16_000,
                is_electric: true,
            },
            Some("EQUIPMENT"),
        ),
        (
            RuleParams::Us30c {
                tract_geoid: "06037201300".to_string(),
                service_date: "2026-01-01".to_string(),
                is_eligible_tract: true,
            },
            Some("INSTALLATION"),
        ),
        (
            RuleParams::UsMacrs2026 {
                asset_cost_minor: 14_000_000,
                placed_in_service_date: "2026-01-01".to_string(),
                tax_bracket: DEFAULT_TAX_BRACKET,
            },
            Some("EQUIPMENT"),
        ),
        (
            RuleParams::UkVat {
                net_amount_minor: receipt.amount_minor,
                unbroken_lineage: event.unbroken_lineage,
            },
            None,
        ),
        (
            RuleParams::UkMtd {
                digital_links_compliant: event.unbroken_lineage,
            },
            None,
        ),
    ]
}

fn idempotency_key(rule_id: &str, receipt_id: &str) -> String {
    format!("claim:{}:{}", rule_id, receipt_id)
}

/// Resume from an existing audit log, or start at genesis
fn open_ledger(path: Option<&Path>) -> anyhow::Result<(ForensicLedger, Option<AuditLogWriter>)> {
    let Some(path) = path else {
        return Ok((ForensicLedger::new(), None));
    };

    let ledger = if path.exists() {
        let ledger = audit_log::load(path)
            .with_context(|| format!("replaying audit log {}", path.display()))?;
        tracing::info!(entries = ledger.len(), "Resumed ledger from audit log");
        ledger
    } else {
        ForensicLedger::new()
    };

    Ok((ledger, Some(AuditLogWriter::open(path)?)))
}

async fn commit_claim(
    ledger: &LedgerHandle,
    claim: &ClaimPayload,
    receipt_id: &str,
) -> anyhow::Result<CommitOutcome> {
    let key = idempotency_key(&claim.rule_id, receipt_id);

    match ledger
        .commit(claim.to_payload()?, key.clone(), Some(claim.adc_key().to_string()))
        .await
    {
        Ok(entry) => Ok(CommitOutcome::Committed {
            chain_hash: *entry.chain_hash(),
        }),
        Err(e) if e.is_recoverable() => match ledger.entry_for_key(key).await? {
            Some(entry) => Ok(CommitOutcome::AlreadyRecorded {
                chain_hash: *entry.chain_hash(),
            }),
            None => {
                tracing::warn!(rule_id = %claim.rule_id, "Claim blocked: {}", e);
                Ok(CommitOutcome::Blocked {
                    reason: e.to_string(),
                })
            }
        },
        Err(e) => Err(e.into()),
    }
}

async fn run(config: &Config, metrics: Option<Metrics>) -> anyhow::Result<DemoReport> {
    let scenario = fleet_depot_scenario()?;

    // 1. Stitching
    let evidence = ReceiptStitcher::new().stitch(&scenario.receipt, &scenario.telemetry)?;

    // 2. Rules
    let registry = RuleRegistry::standard(config.rules.rulepack_version.clone());
    let mut evaluated = Vec::new();
    for (params, category) in rule_inputs(&scenario.receipt, &evidence.event) {
        let result = registry.evaluate(&params)?;
        evaluated.push(match category {
            Some(category) => result.with_basis_category(category),
            None => result,
        });
    }

    // 3. Optimization
    let mut optimizer =
        YieldOptimizer::with_default_category(config.optimizer.default_basis_category.clone());
    if let Some(ref metrics) = metrics {
        optimizer = optimizer.with_metrics(metrics.clone());
    }
    let plan = optimizer.optimize(&evaluated, &scenario.basis);

    // 4. Ledger
    let (mut ledger, audit) = open_ledger(config.ledger.audit_log_path.as_deref())?;
    if let Some(metrics) = metrics {
        ledger = ledger.with_metrics(metrics);
    }
    let handle = spawn_ledger_actor(ledger, audit, config.ledger.mailbox_capacity);

    let fingerprint = registry.fingerprint();
    let mut outcomes = Vec::with_capacity(plan.chosen_incentives.len());
    for result in &plan.chosen_incentives {
        let claim = ClaimPayload::committed(result, evidence.evidence_hash, fingerprint);
        let outcome = commit_claim(&handle, &claim, &scenario.receipt.receipt_id).await?;
        outcomes.push((result.clone(), outcome));
    }

    // 5. Verification
    handle.verify().await?;
    let ledger = handle.shutdown().await?;

    Ok(DemoReport {
        evidence,
        evaluated,
        plan,
        outcomes,
        chain_length: ledger.len(),
        chain_head: ledger.chain_head().copied(),
        rulepack_version: registry.version().to_string(),
    })
}

/// `$1,234.56` from minor units
fn dollars(minor: MinorUnits) -> String {
    let whole = (minor / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("${}.{:02}", grouped, minor % 100)
}

fn print_report(report: &DemoReport) {
    println!("\n🛡️  =================================================================");
    println!("🛡️  VOLTYIELD COMPLIANCE REPORT");
    println!("🛡️  =================================================================\n");

    println!(
        "  📎 Receipt {} → asset {} (score {:.2}, Δt {}s)",
        report.evidence.receipt_id,
        report.evidence.event.asset_id.bold(),
        report.evidence.score,
        report.evidence.time_diff_s
    );
    println!("  📎 Evidence hash: {}", report.evidence.evidence_hash);
    println!("  📎 Rulepack: {}\n", report.rulepack_version);

    println!("  Evaluated rules:");
    for result in &report.evaluated {
        let status = if result.eligible {
            "ELIGIBLE".green()
        } else {
            "NOT ELIGIBLE".red()
        };
        println!(
            "    • {:<14} {:<13} {:>14}   {}",
            result.rule_id,
            status,
            dollars(result.amount),
            result.citation.dimmed()
        );
    }
    println!();

    println!("  Ledger commits:");
    for (result, outcome) in &report.outcomes {
        match outcome {
            CommitOutcome::Committed { chain_hash } => println!(
                "    ✅ {:<14} {:>14}   {}",
                result.rule_id,
                dollars(result.amount),
                chain_hash.to_hex()[..16].dimmed()
            ),
            CommitOutcome::AlreadyRecorded { chain_hash } => println!(
                "    ♻️  {:<14} {:>14}   already recorded at {}",
                result.rule_id,
                dollars(result.amount),
                &chain_hash.to_hex()[..16]
            ),
            CommitOutcome::Blocked { reason } => println!(
                "    ⛔ {:<14} {}",
                result.rule_id,
                reason.yellow()
            ),
        }
    }

    println!("\n  -----------------------------------------------------------------");
    println!(
        "  TOTAL VERIFIED VALUE:  {}",
        dollars(report.plan.total_yield).green().bold()
    );
    for (category, left) in &report.plan.remaining_basis {
        println!("  Basis left {:<13} {}", category, dollars(*left));
    }
    println!(
        "  Chain: {} entries, head {}",
        report.chain_length,
        report
            .chain_head
            .map_or_else(|| "(genesis)".to_string(), |h| h.to_hex())
    );
    println!("  -----------------------------------------------------------------\n");
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.filter)
            .with_context(|| format!("invalid log filter {:?}", config.logging.filter))?,
    };

    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional config file as the only argument; environment otherwise
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        None => Config::from_env()?,
    };

    init_tracing(&config)?;
    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting VoltYield demo"
    );

    let metrics = Metrics::new()?;
    let report = run(&config, Some(metrics.clone())).await?;
    print_report(&report);

    tracing::info!(
        commits = metrics.commits_total.get(),
        yield_minor = metrics.optimized_yield.get(),
        "Demo complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dollars() {
        assert_eq!(dollars(0), "$0.00");
        assert_eq!(dollars(1_500), "$15.00");
        assert_eq!(dollars(4_000_000), "$40,000.00");
        assert_eq!(dollars(123_456_789), "$1,234,567.89");
    }

    #[tokio::test]
    async fn test_runs_are_deterministic() {
        let config = Config::default();
        let first = run(&config, None).await.unwrap();
        let second = run(&config, None).await.unwrap();

        assert_eq!(first.evidence.event.asset_id, "V-001");
        assert_eq!(first.chain_length, first.plan.chosen_incentives.len());
        assert_eq!(first.chain_head, second.chain_head);
        assert!(first.chain_head.is_some());
    }

    #[tokio::test]
    async fn test_plan_contents() {
        let report = run(&Config::default(), None).await.unwrap();

        // 45W capped at $40,000; MACRS 20% × 21% of $140,000; 30C flat; VAT 20% of $15
        assert_eq!(
            report.plan.rule_ids(),
            vec!["US_45W", "US_MACRS_2026", "US_30C", "UK_VAT", "UK_MTD"]
        );
        assert_eq!(report.plan.total_yield, 4_000_000 + 588_000 + 100_000 + 300);
        assert_eq!(report.plan.remaining_basis["EQUIPMENT"], 14_000_000 - 4_588_000);
        assert!(report
            .outcomes
            .iter()
            .all(|(_, o)| matches!(o, CommitOutcome::Committed { .. })));
    }

    #[tokio::test]
    async fn test_rerun_against_audit_log_is_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.ledger.audit_log_path = Some(dir.path().join("audit_trail.jsonl"));

        let first = run(&config, None).await.unwrap();
        let second = run(&config, None).await.unwrap();

        assert_eq!(second.chain_length, first.chain_length);
        assert_eq!(second.chain_head, first.chain_head);
        assert!(second
            .outcomes
            .iter()
            .all(|(_, o)| matches!(o, CommitOutcome::AlreadyRecorded { .. })));
    }
}
