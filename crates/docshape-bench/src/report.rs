use std::time::Duration;

use docshape_core::PopulationReport;
use docshape_core::denormalize::DenormalizeReport;
use docshape_core::harness::{BenchReport, Measurement};
use docshape_core::loader::LoadStats;

use crate::alloc::PhaseAlloc;

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn line(name: &str, duration: Duration, detail: &str) {
    if detail.is_empty() {
        println!("  {:<50} {:>10.2}ms", name, ms(duration));
    } else {
        println!("  {:<50} {:>10.2}ms  ({detail})", name, ms(duration));
    }
}

fn load_line(stats: &LoadStats) {
    let mut detail = format!("{} inserted, {} chunks", stats.inserted, stats.chunks);
    if !stats.skipped.is_empty() {
        detail.push_str(&format!(", {} skipped", stats.skipped.len()));
    }
    line(stats.collection, stats.elapsed, &detail);
}

fn denormalize_line(report: &DenormalizeReport) {
    let mut detail = format!("{} written, {} windows", report.written, report.windows);
    if !report.dangling.is_empty() {
        detail.push_str(&format!(", {} dangling", report.dangling_persons()));
    }
    if !report.rejected.is_empty() {
        detail.push_str(&format!(", {} rejected", report.rejected.len()));
    }
    line(report.target, report.elapsed, &detail);
}

pub fn print_population(report: &PopulationReport) {
    let plan = &report.plan;
    println!(
        "[Population] {} companies, {} persons, {} strategy\n",
        plan.companies, plan.persons, plan.strategy
    );
    load_line(&report.companies);
    load_line(&report.persons);
    denormalize_line(&report.persons_embedded);
    denormalize_line(&report.companies_embedded);
    println!();

    println!("Top companies by person count:");
    for entry in &report.distribution.top {
        println!("  {:<50} {:>10}", entry.company_id.to_hex(), entry.count);
    }
    println!(
        "Average persons per company: {:.2}\n",
        report.distribution.average
    );
    println!(
        "Total population time: {:.2}s\n",
        report.elapsed.as_secs_f64()
    );
}

pub fn print_allocations(phases: &[PhaseAlloc]) {
    println!("[Memory] peak heap growth per phase\n");
    for phase in phases {
        let mib = phase.peak_growth as f64 / (1024.0 * 1024.0);
        line(
            &phase.phase.to_string(),
            phase.elapsed,
            &format!("{mib:.2} MiB peak, {} allocations", phase.total_allocs),
        );
    }
    println!();
}

pub fn print_bench(report: &BenchReport) {
    for suite in &report.suites {
        println!("=== {} ===\n", suite.model);
        for outcome in &suite.outcomes {
            let name = outcome.query.to_string();
            match &outcome.result {
                Ok(Measurement::Read { rows, sample }) => {
                    line(&name, outcome.elapsed, &format!("{rows} rows"));
                    for row in sample {
                        println!("      {row}");
                    }
                }
                Ok(Measurement::Write { matched, modified }) => line(
                    &name,
                    outcome.elapsed,
                    &format!("{matched} matched, {modified} modified"),
                ),
                Err(e) => line(&name, outcome.elapsed, &format!("FAILED: {e}")),
            }
        }
        println!();
    }
    println!("Total query time: {:.2}s", report.elapsed.as_secs_f64());
}

/// One line per failed query, or `None` when every query succeeded.
pub fn failure_summary(report: &BenchReport) -> Option<String> {
    let failures: Vec<String> = report
        .suites
        .iter()
        .flat_map(|suite| suite.failures())
        .map(ToString::to_string)
        .collect();
    if failures.is_empty() {
        return None;
    }
    Some(format!(
        "{} of the benchmark queries failed:\n  {}",
        failures.len(),
        failures.join("\n  ")
    ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use docshape_core::Error;
    use docshape_core::harness::{
        BenchReport, Measurement, Model, QueryError, QueryKind, QueryOutcome, SuiteReport,
    };

    use super::*;

    fn outcome(query: QueryKind, result: Result<Measurement, QueryError>) -> QueryOutcome {
        QueryOutcome {
            model: Model::Reference,
            query,
            elapsed: Duration::ZERO,
            result,
        }
    }

    fn report(outcomes: Vec<QueryOutcome>) -> BenchReport {
        BenchReport {
            suites: vec![SuiteReport {
                model: Model::Reference,
                outcomes,
                elapsed: Duration::ZERO,
            }],
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn clean_run_has_no_failure_summary() {
        let report = report(vec![outcome(
            QueryKind::ResetAges,
            Ok(Measurement::Write {
                matched: 2,
                modified: 2,
            }),
        )]);
        assert_eq!(failure_summary(&report), None);
    }

    #[test]
    fn failed_query_produces_summary() {
        let report = report(vec![
            outcome(
                QueryKind::PersonsWithCompany,
                Err(QueryError {
                    model: Model::Reference,
                    query: QueryKind::PersonsWithCompany,
                    source: Error::Config("lookup refused".into()),
                }),
            ),
            outcome(
                QueryKind::ResetAges,
                Ok(Measurement::Write {
                    matched: 0,
                    modified: 0,
                }),
            ),
        ]);
        let summary = failure_summary(&report).unwrap();
        assert!(
            summary.starts_with("1 of the benchmark queries failed"),
            "{summary}"
        );
        assert!(summary.contains("Q1"), "{summary}");
        assert!(summary.contains("lookup refused"), "{summary}");
    }
}
