//! Cursor-driven builds for datasets too large to hold in memory. Only one
//! window of source records is alive at a time.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use bson::Bson;
use bson::oid::ObjectId;
use docshape_query::{Accumulator, AggregateOptions, Expr, FilterGroup, Operator, Pipeline, Query};
use docshape_store::{Collection, Store};
use serde::Deserialize;
use tracing::info;

use super::{DenormalizeReport, batch_hint};
use crate::error::Error;
use crate::loader::{BulkLoader, LoadSession};
use crate::model::{
    CompaniesEmbedded, CompaniesRef, CompanyWithEmployees, EmbeddedCompany, Employee, Person,
    PersonWithCompany, PersonsEmbedded, PersonsRef,
};

/// Streams `persons_ref` in windows of `window` persons. Each window's
/// distinct company ids are resolved with one `$in` lookup.
pub fn build_persons_embedded<S: Store + ?Sized>(
    store: &S,
    window: usize,
) -> Result<DenormalizeReport, Error> {
    let started = Instant::now();
    let persons = Collection::<S, PersonsRef>::new(store);
    let companies = Collection::<S, CompaniesRef>::new(store);

    let loader = BulkLoader::<S, PersonsEmbedded>::new(store, window);
    let window = loader.chunk_size();
    let total = persons.count(&FilterGroup::all())? as usize;
    let mut session = loader.begin(total.div_ceil(window))?;
    let mut dangling = BTreeMap::new();
    let mut buffer: Vec<Person> = Vec::with_capacity(window);

    for person in persons.find(&Query::all().batch_size(batch_hint(window)))? {
        buffer.push(person?);
        if buffer.len() == window {
            embed_window(&companies, &mut session, &mut buffer, &mut dangling)?;
        }
    }
    if !buffer.is_empty() {
        embed_window(&companies, &mut session, &mut buffer, &mut dangling)?;
    }

    Ok(DenormalizeReport::finish(
        session.finish().stats,
        dangling,
        started,
    ))
}

fn embed_window<S: Store + ?Sized>(
    companies: &Collection<'_, S, CompaniesRef>,
    session: &mut LoadSession<'_, '_, S, PersonsEmbedded>,
    buffer: &mut Vec<Person>,
    dangling: &mut BTreeMap<ObjectId, usize>,
) -> Result<(), Error> {
    let distinct: BTreeSet<ObjectId> = buffer.iter().map(|p| p.company_id).collect();
    let ids = Bson::Array(distinct.into_iter().map(Bson::ObjectId).collect());
    let query = Query::filter(FilterGroup::condition("_id", Operator::In, ids));

    let mut directory = HashMap::new();
    for company in companies.find(&query)? {
        let company = company?;
        directory.insert(company.id, EmbeddedCompany::from(&company));
    }

    let mut docs = Vec::with_capacity(buffer.len());
    for person in buffer.drain(..) {
        match directory.get(&person.company_id) {
            Some(company) => docs.push(PersonWithCompany::embed(&person, company)),
            None => *dangling.entry(person.company_id).or_insert(0) += 1,
        }
    }
    session.insert_chunk(docs)
}

#[derive(Deserialize)]
struct EmployeeGroup {
    #[serde(rename = "_id")]
    company_id: ObjectId,
    employees: Vec<Employee>,
}

fn employee_groups_pipeline() -> Pipeline {
    Pipeline::new().group(
        Expr::field("company_id"),
        [(
            "employees",
            Accumulator::Push(Expr::object([
                ("first_name", Expr::field("first_name")),
                ("last_name", Expr::field("last_name")),
                ("birth_date", Expr::field("birth_date")),
                ("age", Expr::field("age")),
            ])),
        )],
    )
}

/// Groups persons by company server-side (disk spill allowed), then streams
/// `companies_ref` in windows of `window` companies and attaches each
/// company's employee list. Groups left unclaimed belong to companies that
/// do not exist and are reported as dangling.
pub fn build_companies_embedded<S: Store + ?Sized>(
    store: &S,
    window: usize,
) -> Result<DenormalizeReport, Error> {
    let started = Instant::now();
    let persons = Collection::<S, PersonsRef>::new(store);
    let companies = Collection::<S, CompaniesRef>::new(store);

    let options = AggregateOptions {
        allow_disk_use: true,
        batch_size: Some(batch_hint(window.max(1))),
    };
    let mut groups: HashMap<ObjectId, Vec<Employee>> = HashMap::new();
    for group in persons.aggregate::<EmployeeGroup>(&employee_groups_pipeline(), &options)? {
        let group = group?;
        groups.insert(group.company_id, group.employees);
    }
    info!(
        companies_with_employees = groups.len(),
        "grouped persons by company"
    );

    let loader = BulkLoader::<S, CompaniesEmbedded>::new(store, window);
    let window = loader.chunk_size();
    let total = companies.count(&FilterGroup::all())? as usize;
    let mut session = loader.begin(total.div_ceil(window))?;
    let mut buffer: Vec<CompanyWithEmployees> = Vec::with_capacity(window);

    for company in companies.find(&Query::all().batch_size(batch_hint(window)))? {
        let company = company?;
        let employees = groups.remove(&company.id).unwrap_or_default();
        buffer.push(CompanyWithEmployees::new(company, employees));
        if buffer.len() == window {
            session.insert_chunk(std::mem::replace(&mut buffer, Vec::with_capacity(window)))?;
        }
    }
    if !buffer.is_empty() {
        session.insert_chunk(buffer)?;
    }

    let dangling = groups
        .into_iter()
        .map(|(company_id, employees)| (company_id, employees.len()))
        .collect();
    Ok(DenormalizeReport::finish(
        session.finish().stats,
        dangling,
        started,
    ))
}
