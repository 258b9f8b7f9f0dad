use std::fmt;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use docshape_fake::DataProvider;
use docshape_store::Store;
use tracing::{info, info_span};

use crate::denormalize::{self, DenormalizeReport};
use crate::dispatch::{PopulationPlan, Strategy};
use crate::distribution::{Distribution, distribution};
use crate::error::Error;
use crate::generator::{CompanyGenerator, PersonGenerator};
use crate::loader::{Backfill, BulkLoader, LoadStats};
use crate::model::{ALL_COLLECTIONS, CompaniesRef, Company, Person, PersonsRef};

const TOP_COMPANIES: usize = 5;

/// Steps of a population run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reset,
    Companies,
    Persons,
    Distribution,
    PersonsEmbedded,
    CompaniesEmbedded,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Reset => "reset",
            Phase::Companies => "companies",
            Phase::Persons => "persons",
            Phase::Distribution => "distribution",
            Phase::PersonsEmbedded => "persons embedded",
            Phase::CompaniesEmbedded => "companies embedded",
        };
        f.write_str(name)
    }
}

/// Hook called around every phase, e.g. to sample memory usage.
pub trait PhaseObserver {
    fn phase_started(&mut self, _phase: Phase) {}
    fn phase_finished(&mut self, _phase: Phase, _elapsed: Duration) {}
}

impl PhaseObserver for () {}

#[derive(Debug, Clone)]
pub struct PopulationReport {
    pub plan: PopulationPlan,
    pub companies: LoadStats,
    pub persons: LoadStats,
    pub distribution: Distribution,
    pub persons_embedded: DenormalizeReport,
    pub companies_embedded: DenormalizeReport,
    pub elapsed: Duration,
}

/// Drops every collection a population run writes.
pub fn reset<S: Store + ?Sized>(store: &S) -> Result<(), Error> {
    for name in ALL_COLLECTIONS {
        store.drop_collection(name)?;
    }
    info!(collections = ALL_COLLECTIONS.len(), "collections dropped");
    Ok(())
}

pub fn populate<S, P>(
    store: &S,
    provider: &mut P,
    plan: &PopulationPlan,
    today: NaiveDate,
) -> Result<PopulationReport, Error>
where
    S: Store + ?Sized,
    P: DataProvider + ?Sized,
{
    populate_observed(store, provider, plan, today, &mut ())
}

/// Rebuilds all three models from scratch: Model R from generated records,
/// then both embedded models from Model R.
pub fn populate_observed<S, P, O>(
    store: &S,
    provider: &mut P,
    plan: &PopulationPlan,
    today: NaiveDate,
    observer: &mut O,
) -> Result<PopulationReport, Error>
where
    S: Store + ?Sized,
    P: DataProvider + ?Sized,
    O: PhaseObserver + ?Sized,
{
    let _span = info_span!("populate", strategy = %plan.strategy).entered();
    let started = Instant::now();
    let in_memory = plan.strategy == Strategy::InMemory;

    observed(observer, Phase::Reset, || reset(store))?;

    let companies = observed(observer, Phase::Companies, || {
        let backfill = if in_memory {
            Backfill::Records
        } else {
            Backfill::Ids
        };
        let mut generator = CompanyGenerator::new(&mut *provider, today);
        BulkLoader::<S, CompaniesRef>::new(store, plan.chunks.companies)
            .backfill(backfill)
            .load_generated(plan.companies, |count| generator.chunk(count))
    })?;

    let company_ids = companies.ids;
    let persons = observed(observer, Phase::Persons, || {
        let backfill = if in_memory {
            Backfill::Records
        } else {
            Backfill::None
        };
        let mut generator = if plan.persons > 0 {
            Some(PersonGenerator::new(&mut *provider, &company_ids, today)?)
        } else {
            None
        };
        BulkLoader::<S, PersonsRef>::new(store, plan.chunks.persons)
            .backfill(backfill)
            .load_generated(plan.persons, |count| {
                generator
                    .as_mut()
                    .map(|generator| generator.chunk(count))
                    .unwrap_or_default()
            })
    })?;

    let distribution = observed(observer, Phase::Distribution, || {
        distribution(store, TOP_COMPANIES)
    })?;

    let (persons_embedded, companies_embedded) = if in_memory {
        let companies_retained: Vec<Company> = companies
            .retained
            .into_iter()
            .map(|(id, company)| Company::from_new(id, company))
            .collect();
        let persons_retained: Vec<Person> = persons
            .retained
            .into_iter()
            .map(|(_, person)| person)
            .collect();

        let persons_embedded = observed(observer, Phase::PersonsEmbedded, || {
            denormalize::in_memory::build_persons_embedded(
                store,
                &companies_retained,
                &persons_retained,
                plan.chunks.persons_embedded,
            )
        })?;
        let companies_embedded = observed(observer, Phase::CompaniesEmbedded, || {
            denormalize::in_memory::build_companies_embedded(
                store,
                companies_retained,
                persons_retained,
                plan.chunks.companies_embedded,
            )
        })?;
        (persons_embedded, companies_embedded)
    } else {
        let persons_embedded = observed(observer, Phase::PersonsEmbedded, || {
            denormalize::streaming::build_persons_embedded(store, plan.chunks.persons_embedded)
        })?;
        let companies_embedded = observed(observer, Phase::CompaniesEmbedded, || {
            denormalize::streaming::build_companies_embedded(store, plan.chunks.companies_embedded)
        })?;
        (persons_embedded, companies_embedded)
    };

    let report = PopulationReport {
        plan: *plan,
        companies: companies.stats,
        persons: persons.stats,
        distribution,
        persons_embedded,
        companies_embedded,
        elapsed: started.elapsed(),
    };
    info!(
        elapsed_ms = report.elapsed.as_millis() as u64,
        "population finished"
    );
    Ok(report)
}

fn observed<O, T>(
    observer: &mut O,
    phase: Phase,
    step: impl FnOnce() -> Result<T, Error>,
) -> Result<T, Error>
where
    O: PhaseObserver + ?Sized,
{
    info!(%phase, "phase started");
    observer.phase_started(phase);
    let started = Instant::now();
    let result = step();
    observer.phase_finished(phase, started.elapsed());
    result
}
