//! Times the four benchmark operations against each model.
//!
//! Models are measured independently: a failed operation is reported with
//! its model and operation and the remaining operations still run.

use std::fmt;
use std::time::{Duration, Instant};

use bson::DateTime;
use docshape_query::AggregateOptions;
use docshape_store::Store;
use serde::Deserialize;
use tracing::{error, info, info_span};

use crate::error::Error;
use crate::queries::{Operation, operation};

/// Physical schema design under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    /// `companies_ref` + `persons_ref`.
    Reference,
    /// `persons_emb`: company embedded in each person.
    EmbeddedCompany,
    /// `companies_emb`: employees embedded in each company.
    EmbeddedEmployees,
}

impl Model {
    pub const ALL: [Model; 3] = [
        Model::Reference,
        Model::EmbeddedCompany,
        Model::EmbeddedEmployees,
    ];
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Reference => write!(f, "R (references)"),
            Model::EmbeddedCompany => write!(f, "E-in-P (company in person)"),
            Model::EmbeddedEmployees => write!(f, "E-in-C (employees in company)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    PersonsWithCompany,
    EmployeesPerCompany,
    ResetAges,
    RenameCompanies,
}

impl QueryKind {
    pub const ALL: [QueryKind; 4] = [
        QueryKind::PersonsWithCompany,
        QueryKind::EmployeesPerCompany,
        QueryKind::ResetAges,
        QueryKind::RenameCompanies,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            QueryKind::PersonsWithCompany => "Q1",
            QueryKind::EmployeesPerCompany => "Q2",
            QueryKind::ResetAges => "Q3",
            QueryKind::RenameCompanies => "Q4",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            QueryKind::PersonsWithCompany => "persons with company name",
            QueryKind::EmployeesPerCompany => "employee count per company",
            QueryKind::ResetAges => "set age for persons born before cutoff",
            QueryKind::RenameCompanies => "append suffix to company names",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id(), self.description())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Read rows kept per query for display.
    pub sample_size: usize,
    pub batch_size: u32,
    /// Q3 touches persons born strictly before this instant.
    pub cutoff: DateTime,
    pub new_age: i32,
    /// Q4 suffix.
    pub suffix: String,
}

/// 1988-01-01T00:00:00Z
pub const DEFAULT_CUTOFF_MILLIS: i64 = 567_993_600_000;

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            sample_size: 3,
            batch_size: 1000,
            cutoff: DateTime::from_millis(DEFAULT_CUTOFF_MILLIS),
            new_age: 30,
            suffix: " Company".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonCompanyRow {
    pub full_name: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmployeeCountRow {
    pub name: String,
    pub num_employees: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    PersonCompany(PersonCompanyRow),
    EmployeeCount(EmployeeCountRow),
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Row::PersonCompany(row) => write!(
                f,
                "{} @ {}",
                row.full_name.as_deref().unwrap_or("-"),
                row.company_name.as_deref().unwrap_or("-")
            ),
            Row::EmployeeCount(row) => write!(f, "{}: {}", row.name, row.num_employees),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    Read { rows: u64, sample: Vec<Row> },
    Write { matched: u64, modified: u64 },
}

#[derive(Debug, thiserror::Error)]
#[error("{query} on {model} failed: {source}")]
pub struct QueryError {
    pub model: Model,
    pub query: QueryKind,
    pub source: Error,
}

#[derive(Debug)]
pub struct QueryOutcome {
    pub model: Model,
    pub query: QueryKind,
    pub elapsed: Duration,
    pub result: Result<Measurement, QueryError>,
}

impl QueryOutcome {
    /// Modified document count; zero for reads and failures.
    pub fn modified(&self) -> u64 {
        match &self.result {
            Ok(Measurement::Write { modified, .. }) => *modified,
            _ => 0,
        }
    }

    pub fn rows(&self) -> Option<u64> {
        match &self.result {
            Ok(Measurement::Read { rows, .. }) => Some(*rows),
            _ => None,
        }
    }

    pub fn sample(&self) -> &[Row] {
        match &self.result {
            Ok(Measurement::Read { sample, .. }) => sample,
            _ => &[],
        }
    }
}

#[derive(Debug)]
pub struct SuiteReport {
    pub model: Model,
    pub outcomes: Vec<QueryOutcome>,
    pub elapsed: Duration,
}

impl SuiteReport {
    pub fn failures(&self) -> impl Iterator<Item = &QueryError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }

    pub fn outcome(&self, query: QueryKind) -> Option<&QueryOutcome> {
        self.outcomes.iter().find(|o| o.query == query)
    }
}

#[derive(Debug)]
pub struct BenchReport {
    pub suites: Vec<SuiteReport>,
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn suite(&self, model: Model) -> Option<&SuiteReport> {
        self.suites.iter().find(|s| s.model == model)
    }

    pub fn failure_count(&self) -> usize {
        self.suites.iter().map(|s| s.failures().count()).sum()
    }
}

fn execute<S: Store + ?Sized>(
    store: &S,
    operation: &Operation,
    query: QueryKind,
    config: &HarnessConfig,
) -> Result<Measurement, Error> {
    match operation {
        Operation::Read {
            collection,
            pipeline,
        } => {
            let options = AggregateOptions {
                allow_disk_use: true,
                batch_size: Some(config.batch_size),
            };
            let mut rows = 0u64;
            let mut sample = Vec::with_capacity(config.sample_size);
            for doc in store.aggregate(collection, pipeline, &options)? {
                let doc = doc?;
                rows += 1;
                if sample.len() < config.sample_size {
                    let row = match query {
                        QueryKind::EmployeesPerCompany => {
                            Row::EmployeeCount(bson::from_document(doc)?)
                        }
                        _ => Row::PersonCompany(bson::from_document(doc)?),
                    };
                    sample.push(row);
                }
            }
            Ok(Measurement::Read { rows, sample })
        }
        Operation::Write {
            collection,
            filter,
            update,
        } => {
            let result = store.update_many(collection, filter, update)?;
            Ok(Measurement::Write {
                matched: result.matched,
                modified: result.modified,
            })
        }
    }
}

pub fn run_query<S: Store + ?Sized>(
    store: &S,
    model: Model,
    query: QueryKind,
    config: &HarnessConfig,
) -> QueryOutcome {
    let operation = operation(model, query, config);
    let started = Instant::now();
    let result = execute(store, &operation, query, config).map_err(|source| QueryError {
        model,
        query,
        source,
    });
    let elapsed = started.elapsed();

    match &result {
        Ok(Measurement::Read { rows, .. }) => info!(
            query = query.id(),
            collection = operation.collection(),
            rows,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "read finished"
        ),
        Ok(Measurement::Write { matched, modified }) => info!(
            query = query.id(),
            collection = operation.collection(),
            matched,
            modified,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "write finished"
        ),
        Err(e) => error!(error = %e, "query failed"),
    }

    QueryOutcome {
        model,
        query,
        elapsed,
        result,
    }
}

pub fn run_suite<S: Store + ?Sized>(
    store: &S,
    model: Model,
    config: &HarnessConfig,
) -> SuiteReport {
    let _span = info_span!("suite", %model).entered();
    let started = Instant::now();
    let outcomes = QueryKind::ALL
        .into_iter()
        .map(|query| run_query(store, model, query, config))
        .collect();
    SuiteReport {
        model,
        outcomes,
        elapsed: started.elapsed(),
    }
}

/// Runs every suite in model order: R, E-in-P, E-in-C.
pub fn run_all<S: Store + ?Sized>(store: &S, config: &HarnessConfig) -> BenchReport {
    let started = Instant::now();
    let suites = Model::ALL
        .into_iter()
        .map(|model| run_suite(store, model, config))
        .collect();
    let report = BenchReport {
        suites,
        elapsed: started.elapsed(),
    };
    info!(
        failures = report.failure_count(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "benchmark finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    #[test]
    fn default_cutoff_is_start_of_1988_utc() {
        let expected = Utc.with_ymd_and_hms(1988, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(DEFAULT_CUTOFF_MILLIS, expected.timestamp_millis());
        let date = crate::generator::utc_date(HarnessConfig::default().cutoff).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(1988, 1, 1).unwrap());
    }

    #[test]
    fn query_display_carries_id() {
        assert_eq!(QueryKind::ResetAges.id(), "Q3");
        assert!(QueryKind::RenameCompanies.to_string().starts_with("Q4 "));
    }

    #[test]
    fn failed_outcome_reports_zero_modified() {
        let outcome = QueryOutcome {
            model: Model::Reference,
            query: QueryKind::ResetAges,
            elapsed: Duration::ZERO,
            result: Err(QueryError {
                model: Model::Reference,
                query: QueryKind::ResetAges,
                source: Error::Config("boom".into()),
            }),
        };
        assert_eq!(outcome.modified(), 0);
        assert_eq!(outcome.rows(), None);
        let message = outcome.result.unwrap_err().to_string();
        assert!(message.contains("Q3"), "{message}");
        assert!(message.contains("R (references)"), "{message}");
    }
}
