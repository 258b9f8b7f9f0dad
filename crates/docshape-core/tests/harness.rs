mod common;

use bson::{DateTime, doc};
use chrono::NaiveDate;
use docshape_core::dispatch::Strategy;
use docshape_core::generator::midnight_utc;
use docshape_core::harness::{
    DEFAULT_CUTOFF_MILLIS, HarnessConfig, Measurement, Model, QueryKind, Row, run_all, run_query,
    run_suite,
};
use docshape_core::model::{
    CompaniesEmbedded, CompaniesRef, CompanyWithEmployees, EmbeddedCompany, Employee,
    PersonWithCompany, PersonsEmbedded, PersonsRef,
};
use docshape_query::{AggregateOptions, FilterGroup, Pipeline, Query, Update};
use docshape_store::{
    Collection, CollectionOptions, DocumentIter, IndexSpec, InsertManyResult, MemoryStore, Schema,
    Store, StoreError, UpdateResult,
};

fn date(y: i32, m: u32, d: u32) -> DateTime {
    midnight_utc(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

#[test]
fn zero_employee_companies_appear_in_every_model() {
    let (store, _) = common::populated(5, 0, Strategy::InMemory, 1);
    let config = HarnessConfig {
        sample_size: 10,
        ..HarnessConfig::default()
    };
    for model in Model::ALL {
        let outcome = run_query(&store, model, QueryKind::EmployeesPerCompany, &config);
        assert_eq!(outcome.rows(), Some(5), "{model}");
        assert_eq!(outcome.sample().len(), 5);
        for row in outcome.sample() {
            let Row::EmployeeCount(row) = row else {
                panic!("unexpected row {row:?}");
            };
            assert_eq!(row.num_employees, 0);
        }
    }
}

#[test]
fn employee_counts_sorted_largest_first() {
    let (store, _) = common::populated(8, 120, Strategy::InMemory, 2);
    let config = HarnessConfig {
        sample_size: 8,
        ..HarnessConfig::default()
    };
    for model in Model::ALL {
        let outcome = run_query(&store, model, QueryKind::EmployeesPerCompany, &config);
        let counts: Vec<i64> = outcome
            .sample()
            .iter()
            .map(|row| match row {
                Row::EmployeeCount(row) => row.num_employees,
                other => panic!("unexpected row {other:?}"),
            })
            .collect();
        assert_eq!(counts.len(), 8);
        assert_eq!(counts.iter().sum::<i64>(), 120, "{model}");
        assert!(counts.windows(2).all(|pair| pair[0] >= pair[1]), "{model}");
    }
}

#[test]
fn join_returns_one_row_per_person() {
    let (store, _) = common::populated(6, 90, Strategy::Streaming, 3);
    let config = HarnessConfig::default();
    for model in Model::ALL {
        let outcome = run_query(&store, model, QueryKind::PersonsWithCompany, &config);
        assert_eq!(outcome.rows(), Some(90), "{model}");
        assert_eq!(outcome.sample().len(), 3);
        let Row::PersonCompany(row) = &outcome.sample()[0] else {
            panic!("unexpected row");
        };
        assert!(
            row.full_name
                .as_deref()
                .is_some_and(|name| name.contains(' '))
        );
        assert!(row.company_name.is_some());
    }
}

#[test]
fn rename_is_idempotent() {
    let (store, _) = common::populated(10, 40, Strategy::InMemory, 4);
    let config = HarnessConfig::default();
    for model in Model::ALL {
        let first = run_query(&store, model, QueryKind::RenameCompanies, &config);
        assert!(first.result.is_ok(), "{model}");
        let second = run_query(&store, model, QueryKind::RenameCompanies, &config);
        assert_eq!(second.modified(), 0, "{model}");
    }

    let names: Vec<String> = Collection::<_, CompaniesRef>::new(&store)
        .find(&Query::all())
        .unwrap()
        .map(|company| company.unwrap().name)
        .collect();
    assert!(names.iter().all(|name| name.ends_with(" Company")));
    assert!(names.iter().all(|name| !name.ends_with(" Company Company")));

    let embedded = Collection::<_, PersonsEmbedded>::new(&store)
        .find(&Query::all())
        .unwrap()
        .map(|person| person.unwrap().company.name);
    for name in embedded {
        assert!(name.ends_with(" Company") && !name.ends_with(" Company Company"));
    }
}

#[test]
fn age_update_boundary_on_reference_model() {
    let store = MemoryStore::new();
    let company = bson::oid::ObjectId::new();
    store
        .insert_many(
            PersonsRef::NAME,
            vec![
                doc! { "first_name": "On", "last_name": "Cutoff", "birth_date": date(1988, 1, 1), "age": 50, "company_id": company },
                doc! { "first_name": "Day", "last_name": "Before", "birth_date": date(1987, 12, 31), "age": 50, "company_id": company },
            ],
        )
        .unwrap();

    let outcome = run_query(
        &store,
        Model::Reference,
        QueryKind::ResetAges,
        &HarnessConfig::default(),
    );
    assert_eq!(
        outcome.result.unwrap(),
        Measurement::Write {
            matched: 1,
            modified: 1
        }
    );

    let ages: Vec<(String, i32)> = Collection::<_, PersonsRef>::new(&store)
        .find(&Query::all())
        .unwrap()
        .map(|person| {
            let person = person.unwrap();
            (person.first_name, person.age)
        })
        .collect();
    assert_eq!(ages, vec![("On".to_string(), 50), ("Day".to_string(), 30)]);
}

#[test]
fn age_update_boundary_on_embedded_company_model() {
    let store = MemoryStore::new();
    let company = EmbeddedCompany {
        id: bson::oid::ObjectId::new(),
        name: "Acme".into(),
        address: "1 Road".into(),
    };
    let person = |first: &str, birth: DateTime| PersonWithCompany {
        first_name: first.into(),
        last_name: "Smith".into(),
        birth_date: birth,
        age: 50,
        company: company.clone(),
    };
    let persons = Collection::<_, PersonsEmbedded>::new(&store);
    persons
        .insert_many(&[
            person("On", DateTime::from_millis(DEFAULT_CUTOFF_MILLIS)),
            person("Just", DateTime::from_millis(DEFAULT_CUTOFF_MILLIS - 1)),
            person("Later", date(1990, 3, 3)),
        ])
        .unwrap();

    let outcome = run_query(
        &store,
        Model::EmbeddedCompany,
        QueryKind::ResetAges,
        &HarnessConfig::default(),
    );
    assert_eq!(
        outcome.result.unwrap(),
        Measurement::Write {
            matched: 1,
            modified: 1
        }
    );

    let ages: Vec<(String, i32)> = persons
        .find(&Query::all())
        .unwrap()
        .map(|person| {
            let person = person.unwrap();
            (person.first_name, person.age)
        })
        .collect();
    assert_eq!(
        ages,
        vec![
            ("On".to_string(), 50),
            ("Just".to_string(), 30),
            ("Later".to_string(), 50)
        ]
    );
}

#[test]
fn age_update_touches_only_matching_embedded_employees() {
    let store = MemoryStore::new();
    let employee = |first: &str, birth: DateTime| Employee {
        first_name: first.into(),
        last_name: "Smith".into(),
        birth_date: birth,
        age: 50,
    };
    let companies = Collection::<_, CompaniesEmbedded>::new(&store);
    companies
        .insert_many(&[
            CompanyWithEmployees {
                id: bson::oid::ObjectId::new(),
                name: "Mixed".into(),
                address: "1 Road".into(),
                founded: date(2000, 1, 1),
                employees: vec![
                    employee("On", date(1988, 1, 1)),
                    employee("Before", date(1987, 12, 31)),
                ],
            },
            CompanyWithEmployees {
                id: bson::oid::ObjectId::new(),
                name: "Young".into(),
                address: "2 Road".into(),
                founded: date(2000, 1, 1),
                employees: vec![employee("Late", date(1995, 5, 5))],
            },
        ])
        .unwrap();

    let outcome = run_query(
        &store,
        Model::EmbeddedEmployees,
        QueryKind::ResetAges,
        &HarnessConfig::default(),
    );
    assert_eq!(outcome.modified(), 1);

    let stored: Vec<CompanyWithEmployees> = companies
        .find(&Query::all())
        .unwrap()
        .map(|company| company.unwrap())
        .collect();
    let ages: Vec<i32> = stored[0].employees.iter().map(|e| e.age).collect();
    assert_eq!(ages, vec![50, 30]);
    assert_eq!(stored[1].employees[0].age, 50);
}

#[test]
fn models_are_updated_independently() {
    let (store, _) = common::populated(4, 60, Strategy::InMemory, 5);
    let config = HarnessConfig::default();
    run_query(&store, Model::Reference, QueryKind::ResetAges, &config);

    let born_before = Collection::<_, PersonsRef>::new(&store)
        .count(&FilterGroup::condition(
            "birth_date",
            docshape_query::Operator::Lt,
            config.cutoff,
        ))
        .unwrap();
    let embedded_at_new_age = Collection::<_, PersonsEmbedded>::new(&store)
        .find(&Query::all())
        .unwrap()
        .map(|person| person.unwrap())
        .filter(|person| person.birth_date < config.cutoff && person.age != 30)
        .count();
    // E-in-P keeps its generated ages until its own Q3 runs.
    assert!(born_before > 0);
    assert!(embedded_at_new_age > 0);
}

/// Delegates to a memory store but fails every aggregation.
struct BrokenAggregation(MemoryStore);

impl Store for BrokenAggregation {
    fn create_collection(&self, name: &str, options: &CollectionOptions) -> Result<(), StoreError> {
        self.0.create_collection(name, options)
    }

    fn drop_collection(&self, name: &str) -> Result<(), StoreError> {
        self.0.drop_collection(name)
    }

    fn drop_database(&self) -> Result<(), StoreError> {
        self.0.drop_database()
    }

    fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), StoreError> {
        self.0.create_index(collection, index)
    }

    fn insert_many(
        &self,
        collection: &str,
        docs: Vec<bson::Document>,
    ) -> Result<InsertManyResult, StoreError> {
        self.0.insert_many(collection, docs)
    }

    fn count(&self, collection: &str, filter: &FilterGroup) -> Result<u64, StoreError> {
        self.0.count(collection, filter)
    }

    fn find(&self, collection: &str, query: &Query) -> Result<DocumentIter<'_>, StoreError> {
        self.0.find(collection, query)
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &FilterGroup,
        update: &Update,
    ) -> Result<UpdateResult, StoreError> {
        self.0.update_many(collection, filter, update)
    }

    fn aggregate(
        &self,
        collection: &str,
        _pipeline: &Pipeline,
        _options: &AggregateOptions,
    ) -> Result<DocumentIter<'_>, StoreError> {
        Err(StoreError::Backend(format!(
            "aggregation disabled on {collection}"
        )))
    }
}

#[test]
fn failed_operation_is_reported_and_suite_continues() {
    let (memory, _) = common::populated(3, 12, Strategy::InMemory, 6);
    let store = BrokenAggregation(memory);
    let config = HarnessConfig::default();

    let suite = run_suite(&store, Model::Reference, &config);
    assert_eq!(suite.outcomes.len(), 4);
    assert_eq!(suite.failures().count(), 2);

    let failed = suite.outcome(QueryKind::PersonsWithCompany).unwrap();
    assert_eq!(failed.modified(), 0);
    let message = failed.result.as_ref().unwrap_err().to_string();
    assert!(message.contains("Q1"), "{message}");
    assert!(message.contains("R (references)"), "{message}");
    assert!(message.contains("aggregation disabled"), "{message}");

    assert!(suite.outcome(QueryKind::ResetAges).unwrap().result.is_ok());
    assert!(
        suite
            .outcome(QueryKind::RenameCompanies)
            .unwrap()
            .modified()
            > 0
    );

    let report = run_all(&store, &config);
    assert_eq!(report.suites.len(), 3);
    assert_eq!(report.failure_count(), 6);
}
