#![allow(dead_code)]

use std::collections::BTreeMap;

use bson::oid::ObjectId;
use chrono::NaiveDate;
use docshape_core::dispatch::{PopulationConfig, PopulationPlan, Strategy};
use docshape_core::model::{CompaniesEmbedded, PersonsEmbedded, PersonsRef};
use docshape_core::{PopulationReport, populate};
use docshape_fake::FakeProvider;
use docshape_query::{FilterGroup, Query};
use docshape_store::{Collection, MemoryStore};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

pub fn plan(companies: usize, persons: usize, strategy: Strategy) -> PopulationPlan {
    PopulationPlan::new(&PopulationConfig {
        companies,
        persons,
        strategy: Some(strategy),
        ..PopulationConfig::default()
    })
    .unwrap()
}

pub fn populated(
    companies: usize,
    persons: usize,
    strategy: Strategy,
    seed: u64,
) -> (MemoryStore, PopulationReport) {
    let store = MemoryStore::new();
    let mut provider = FakeProvider::seeded(seed);
    let report = populate(
        &store,
        &mut provider,
        &plan(companies, persons, strategy),
        today(),
    )
    .unwrap();
    (store, report)
}

pub fn count<M: docshape_store::Schema>(store: &MemoryStore) -> u64 {
    Collection::<_, M>::new(store)
        .count(&FilterGroup::all())
        .unwrap()
}

/// Company id -> persons referencing it in `persons_ref`.
pub fn reference_counts(store: &MemoryStore) -> BTreeMap<ObjectId, usize> {
    let mut counts = BTreeMap::new();
    for person in Collection::<_, PersonsRef>::new(store)
        .find(&Query::all())
        .unwrap()
    {
        *counts.entry(person.unwrap().company_id).or_insert(0) += 1;
    }
    counts
}

/// Company id -> persons embedding it in `persons_emb`.
pub fn embedded_person_counts(store: &MemoryStore) -> BTreeMap<ObjectId, usize> {
    let mut counts = BTreeMap::new();
    for person in Collection::<_, PersonsEmbedded>::new(store)
        .find(&Query::all())
        .unwrap()
    {
        *counts.entry(person.unwrap().company.id).or_insert(0) += 1;
    }
    counts
}

/// Company id -> employee array length in `companies_emb`, skipping
/// companies without employees.
pub fn employee_counts(store: &MemoryStore) -> BTreeMap<ObjectId, usize> {
    Collection::<_, CompaniesEmbedded>::new(store)
        .find(&Query::all())
        .unwrap()
        .map(|company| company.unwrap())
        .filter(|company| !company.employees.is_empty())
        .map(|company| (company.id, company.employees.len()))
        .collect()
}

/// Sorted multiset of per-company employee counts, zeros included.
pub fn count_distribution(store: &MemoryStore) -> Vec<usize> {
    let mut counts: Vec<usize> = Collection::<_, CompaniesEmbedded>::new(store)
        .find(&Query::all())
        .unwrap()
        .map(|company| company.unwrap().employees.len())
        .collect();
    counts.sort_unstable();
    counts
}
