//! Joins over records retained from the Model R load.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use bson::oid::ObjectId;
use docshape_store::Store;

use super::DenormalizeReport;
use crate::error::Error;
use crate::loader::BulkLoader;
use crate::model::{
    CompaniesEmbedded, Company, CompanyWithEmployees, EmbeddedCompany, Employee, Person,
    PersonWithCompany, PersonsEmbedded,
};

/// Writes one `persons_emb` document per person, chunk by chunk, with the
/// company looked up in a map over the full company set.
pub fn build_persons_embedded<S: Store + ?Sized>(
    store: &S,
    companies: &[Company],
    persons: &[Person],
    chunk_size: usize,
) -> Result<DenormalizeReport, Error> {
    let started = Instant::now();
    let directory: HashMap<ObjectId, EmbeddedCompany> = companies
        .iter()
        .map(|company| (company.id, EmbeddedCompany::from(company)))
        .collect();

    let loader = BulkLoader::<S, PersonsEmbedded>::new(store, chunk_size);
    let mut session = loader.begin(persons.len().div_ceil(loader.chunk_size()))?;
    let mut dangling = BTreeMap::new();

    for window in persons.chunks(loader.chunk_size()) {
        let mut docs = Vec::with_capacity(window.len());
        for person in window {
            match directory.get(&person.company_id) {
                Some(company) => docs.push(PersonWithCompany::embed(person, company)),
                None => *dangling.entry(person.company_id).or_insert(0) += 1,
            }
        }
        session.insert_chunk(docs)?;
    }

    Ok(DenormalizeReport::finish(
        session.finish().stats,
        dangling,
        started,
    ))
}

/// Writes one `companies_emb` document per company with its employees.
/// Persons are grouped by company in a single pass and companies are
/// consumed chunk by chunk, so both inputs are released as the build runs.
pub fn build_companies_embedded<S: Store + ?Sized>(
    store: &S,
    companies: Vec<Company>,
    persons: Vec<Person>,
    chunk_size: usize,
) -> Result<DenormalizeReport, Error> {
    let started = Instant::now();
    let mut employees: HashMap<ObjectId, Vec<Employee>> = companies
        .iter()
        .map(|company| (company.id, Vec::new()))
        .collect();
    let mut dangling = BTreeMap::new();
    for person in persons {
        match employees.get_mut(&person.company_id) {
            Some(list) => list.push(Employee::from(person)),
            None => *dangling.entry(person.company_id).or_insert(0) += 1,
        }
    }

    let loader = BulkLoader::<S, CompaniesEmbedded>::new(store, chunk_size);
    let mut session = loader.begin(companies.len().div_ceil(loader.chunk_size()))?;
    let mut companies = companies.into_iter();
    loop {
        let window: Vec<CompanyWithEmployees> = companies
            .by_ref()
            .take(loader.chunk_size())
            .map(|company| {
                let list = employees.remove(&company.id).unwrap_or_default();
                CompanyWithEmployees::new(company, list)
            })
            .collect();
        if window.is_empty() {
            break;
        }
        session.insert_chunk(window)?;
    }

    Ok(DenormalizeReport::finish(
        session.finish().stats,
        dangling,
        started,
    ))
}
