//! `ga reconcile`: reconcile a guide file against contract and reference
//! data without touching the database.

use anyhow::{Context, Result};
use ga_config::{load_contracts, load_reference_tables};
use ga_reconcile::{reconcile_guide, GuideReconciliation, OutcomeStatus, PendencyStats};
use ga_schemas::ContractBook;
use tracing::{info, warn};

use super::{load_engine_config, load_guide_file, parse_as_of};

pub struct ReconcileArgs {
    pub guide: String,
    pub config_paths: Vec<String>,
    pub contracts: Option<String>,
    pub reference: Option<String>,
    pub as_of: Option<String>,
    pub json: bool,
}

pub fn reconcile_file(args: ReconcileArgs) -> Result<()> {
    let cfg = load_engine_config(&args.config_paths)?;
    let as_of = parse_as_of(args.as_of.as_deref())?;

    let procedures = load_guide_file(&args.guide)?;
    let guide_id = procedures
        .first()
        .map(|p| p.guide_id)
        .context("guide has no procedures")?;

    let refs = match &args.reference {
        Some(path) => load_reference_tables(std::path::Path::new(path))?,
        None => cfg.load_reference_tables()?,
    };

    let contracts_path = args
        .contracts
        .as_deref()
        .map(std::path::PathBuf::from)
        .or_else(|| cfg.contracts_path.clone());
    let contracts = match contracts_path {
        Some(path) => load_contracts(&path)?,
        None => {
            warn!("no contracts file given; every code is uncontracted");
            Vec::new()
        }
    };
    let book = ContractBook::new(as_of, contracts);

    let report = reconcile_guide(&procedures, &book, &refs, &cfg.reconcile_settings());
    info!(
        guide_id = %guide_id,
        procedures = procedures.len(),
        pendencies = report.pendencies.total,
        "guide reconciled"
    );

    if args.json {
        let out = serde_json::json!({
            "guide_id": guide_id,
            "as_of": as_of,
            "procedures": report.procedures,
            "pendencies": report.pendencies,
        });
        println!("{}", serde_json::to_string_pretty(&out).context("serialize report failed")?);
    } else {
        println!("guide_id={} procedures={} as_of={}", guide_id, procedures.len(), as_of);
        print_pendency_lines(&report);
        println!("{}", pendency_summary(&report.pendencies));
    }
    Ok(())
}

fn print_pendency_lines(report: &GuideReconciliation) {
    for row in &report.procedures {
        for o in row.outcomes.iter().filter(|o| o.is_pendency()) {
            println!(
                "pendency seq={} code={} category={} status={} message={}",
                row.sequence_number,
                row.tariff_code,
                o.category.as_str(),
                status_str(o.status),
                o.message
            );
        }
    }
}

fn status_str(s: OutcomeStatus) -> &'static str {
    match s {
        OutcomeStatus::Conformant => "CONFORMANT",
        OutcomeStatus::NonConformant => "NON_CONFORMANT",
        OutcomeStatus::Alert => "ALERT",
    }
}

pub fn pendency_summary(p: &PendencyStats) -> String {
    format!(
        "pendencies total={} surgical_tier={} guideline={} package={} value={} duplicate={}",
        p.total, p.surgical_tier, p.guideline, p.package, p.value, p.duplicate
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_every_category() {
        let p = PendencyStats {
            total: 3,
            surgical_tier: 0,
            guideline: 0,
            package: 1,
            value: 2,
            duplicate: 0,
        };
        assert_eq!(
            pendency_summary(&p),
            "pendencies total=3 surgical_tier=0 guideline=0 package=1 value=2 duplicate=0"
        );
    }
}
