use bson::oid::ObjectId;
use docshape_query::{Accumulator, AggregateOptions, Expr, FilterGroup, Pipeline, Sort};
use docshape_store::{Collection, Store};
use serde::Deserialize;
use tracing::info;

use crate::error::Error;
use crate::model::{CompaniesRef, PersonsRef};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompanyCount {
    #[serde(rename = "_id")]
    pub company_id: ObjectId,
    pub count: i64,
}

/// How Model R persons spread over companies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    /// Largest companies by person count, largest first.
    pub top: Vec<CompanyCount>,
    pub average: f64,
}

/// Computes the top `top_n` companies by person count server-side and the
/// average persons per company.
pub fn distribution<S: Store + ?Sized>(store: &S, top_n: usize) -> Result<Distribution, Error> {
    let persons = Collection::<S, PersonsRef>::new(store);
    let companies = Collection::<S, CompaniesRef>::new(store);

    let pipeline = Pipeline::new()
        .group(Expr::field("company_id"), [("count", Accumulator::Count)])
        .sort(Sort::desc("count"))
        .sort(Sort::asc("_id"))
        .limit(top_n);
    let options = AggregateOptions {
        allow_disk_use: true,
        batch_size: None,
    };
    let top = persons
        .aggregate::<CompanyCount>(&pipeline, &options)?
        .collect::<Result<Vec<_>, _>>()?;

    let person_count = persons.count(&FilterGroup::all())?;
    let company_count = companies.count(&FilterGroup::all())?;
    let average = if company_count == 0 {
        0.0
    } else {
        person_count as f64 / company_count as f64
    };

    for entry in &top {
        info!(company = %entry.company_id, persons = entry.count, "top company");
    }
    info!(average = %format!("{average:.2}"), "persons per company");
    Ok(Distribution { top, average })
}
