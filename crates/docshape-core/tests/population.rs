mod common;

use bson::DateTime;
use bson::oid::ObjectId;
use common::{count, populated};
use docshape_core::denormalize::{DenormalizeReport, in_memory, streaming};
use docshape_core::dispatch::{PopulationConfig, PopulationPlan, Strategy};
use docshape_core::model::{
    CompaniesEmbedded, CompaniesRef, Company, Person, PersonsEmbedded, PersonsRef,
};
use docshape_core::{Error, Phase, PhaseObserver, populate_observed};
use docshape_fake::FakeProvider;
use docshape_query::Query;
use docshape_store::{Collection, MemoryStore, Schema, Store};

#[test]
fn every_model_holds_every_person() {
    for strategy in [Strategy::InMemory, Strategy::Streaming] {
        let (store, report) = populated(20, 300, strategy, 1);
        assert_eq!(count::<CompaniesRef>(&store), 20, "{strategy}");
        assert_eq!(count::<PersonsRef>(&store), 300, "{strategy}");
        assert_eq!(count::<PersonsEmbedded>(&store), 300, "{strategy}");
        assert_eq!(count::<CompaniesEmbedded>(&store), 20, "{strategy}");

        assert_eq!(report.companies.inserted, 20);
        assert_eq!(report.persons.inserted, 300);
        assert_eq!(report.persons_embedded.written, 300);
        assert_eq!(report.companies_embedded.written, 20);
        assert_eq!(report.persons_embedded.dangling_persons(), 0);
        assert_eq!(report.companies_embedded.dangling_persons(), 0);
    }
}

#[test]
fn employee_counts_agree_across_models() {
    for strategy in [Strategy::InMemory, Strategy::Streaming] {
        let (store, _) = populated(15, 200, strategy, 2);
        let reference = common::reference_counts(&store);
        assert_eq!(
            reference,
            common::embedded_person_counts(&store),
            "{strategy}"
        );
        assert_eq!(reference, common::employee_counts(&store), "{strategy}");
    }
}

#[test]
fn strategies_build_equivalent_collections() {
    let (in_memory, _) = populated(12, 150, Strategy::InMemory, 3);
    let (streaming, _) = populated(12, 150, Strategy::Streaming, 3);

    assert_eq!(
        count::<PersonsEmbedded>(&in_memory),
        count::<PersonsEmbedded>(&streaming)
    );
    assert_eq!(
        count::<CompaniesEmbedded>(&in_memory),
        count::<CompaniesEmbedded>(&streaming)
    );
    assert_eq!(
        common::count_distribution(&in_memory),
        common::count_distribution(&streaming)
    );
}

#[test]
fn companies_without_persons_get_empty_employee_lists() {
    for strategy in [Strategy::InMemory, Strategy::Streaming] {
        let (store, report) = populated(5, 0, strategy, 4);
        assert_eq!(common::count_distribution(&store), vec![0; 5]);
        assert_eq!(count::<PersonsEmbedded>(&store), 0);
        assert!(report.distribution.top.is_empty());
        assert_eq!(report.distribution.average, 0.0);
    }
}

#[test]
fn distribution_lists_largest_companies_first() {
    let (store, report) = populated(10, 500, Strategy::InMemory, 5);
    let top = &report.distribution.top;
    assert_eq!(top.len(), 5);
    assert!(top.windows(2).all(|pair| pair[0].count >= pair[1].count));

    let reference = common::reference_counts(&store);
    let largest = reference.values().copied().max().unwrap();
    assert_eq!(top[0].count as usize, largest);
    assert!((report.distribution.average - 50.0).abs() < f64::EPSILON);
}

#[test]
fn repopulating_replaces_previous_data() {
    let store = MemoryStore::new();
    let plan = common::plan(4, 40, Strategy::InMemory);
    for seed in [1, 2] {
        let mut provider = FakeProvider::seeded(seed);
        docshape_core::populate(&store, &mut provider, &plan, common::today()).unwrap();
    }
    assert_eq!(count::<CompaniesRef>(&store), 4);
    assert_eq!(count::<PersonsRef>(&store), 40);
    assert_eq!(count::<PersonsEmbedded>(&store), 40);
    assert_eq!(count::<CompaniesEmbedded>(&store), 4);
}

#[test]
fn persons_without_companies_is_a_config_error() {
    let result = PopulationPlan::new(&PopulationConfig {
        companies: 0,
        persons: 5,
        ..PopulationConfig::default()
    });
    assert!(matches!(result, Err(Error::Config(_))));
}

#[derive(Default)]
struct Recorder {
    started: Vec<Phase>,
    finished: Vec<Phase>,
}

impl PhaseObserver for Recorder {
    fn phase_started(&mut self, phase: Phase) {
        self.started.push(phase);
    }

    fn phase_finished(&mut self, phase: Phase, _elapsed: std::time::Duration) {
        self.finished.push(phase);
    }
}

#[test]
fn observer_sees_every_phase_in_order() {
    let store = MemoryStore::new();
    let mut provider = FakeProvider::seeded(6);
    let mut recorder = Recorder::default();
    populate_observed(
        &store,
        &mut provider,
        &common::plan(3, 10, Strategy::Streaming),
        common::today(),
        &mut recorder,
    )
    .unwrap();

    let expected = vec![
        Phase::Reset,
        Phase::Companies,
        Phase::Persons,
        Phase::Distribution,
        Phase::PersonsEmbedded,
        Phase::CompaniesEmbedded,
    ];
    assert_eq!(recorder.started, expected);
    assert_eq!(recorder.finished, expected);
}

fn read_all<M: Schema>(store: &MemoryStore) -> Vec<M::Stored> {
    Collection::<_, M>::new(store)
        .find(&Query::all())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

/// Adds one `persons_ref` record pointing at a company that does not exist
/// and clears both embedded collections.
fn add_orphan(store: &MemoryStore) -> ObjectId {
    let missing = ObjectId::new();
    let orphan = Person {
        first_name: "Orphan".into(),
        last_name: "Nobody".into(),
        birth_date: DateTime::from_millis(0),
        age: 54,
        company_id: missing,
    };
    let result = Collection::<_, PersonsRef>::new(store)
        .insert_many(&[orphan])
        .unwrap();
    assert_eq!(result.inserted_count(), 1);
    store.drop_collection(PersonsEmbedded::NAME).unwrap();
    store.drop_collection(CompaniesEmbedded::NAME).unwrap();
    missing
}

fn assert_orphan_skipped(
    store: &MemoryStore,
    missing: ObjectId,
    persons: &DenormalizeReport,
    companies: &DenormalizeReport,
) {
    for report in [persons, companies] {
        assert_eq!(report.dangling_persons(), 1, "{}", report.target);
        assert_eq!(
            report.dangling.keys().copied().collect::<Vec<_>>(),
            vec![missing]
        );
    }
    assert_eq!(persons.written, 30);
    assert_eq!(companies.written, 4);

    assert_eq!(count::<PersonsEmbedded>(store), 30);
    for doc in store.find(PersonsEmbedded::NAME, &Query::all()).unwrap() {
        let doc = doc.unwrap();
        let company = doc.get_document("company").unwrap();
        assert_ne!(company.get_object_id("_id").unwrap(), missing);
    }

    let embedded: Vec<_> = read_all::<CompaniesEmbedded>(store);
    let employees: usize = embedded.iter().map(|c| c.employees.len()).sum();
    assert_eq!(employees, 30);
    assert!(
        embedded
            .iter()
            .flat_map(|c| &c.employees)
            .all(|e| e.first_name != "Orphan")
    );
}

#[test]
fn streaming_skips_persons_with_missing_company() {
    let (store, _) = populated(4, 30, Strategy::Streaming, 7);
    let missing = add_orphan(&store);

    let persons = streaming::build_persons_embedded(&store, 8).unwrap();
    let companies = streaming::build_companies_embedded(&store, 2).unwrap();
    assert_orphan_skipped(&store, missing, &persons, &companies);
}

#[test]
fn in_memory_join_skips_persons_with_missing_company() {
    let (store, _) = populated(4, 30, Strategy::InMemory, 8);
    let missing = add_orphan(&store);
    let companies: Vec<Company> = read_all::<CompaniesRef>(&store);
    let persons_ref: Vec<Person> = read_all::<PersonsRef>(&store);
    assert_eq!(persons_ref.len(), 31);

    let persons = in_memory::build_persons_embedded(&store, &companies, &persons_ref, 8).unwrap();
    let companies = in_memory::build_companies_embedded(&store, companies, persons_ref, 2).unwrap();
    assert_orphan_skipped(&store, missing, &persons, &companies);
}
