mod common;

use bson::DateTime;
use docshape_core::generator::CompanyGenerator;
use docshape_core::loader::{Backfill, BulkLoader};
use docshape_core::model::{CompaniesRef, NewCompany};
use docshape_fake::FakeProvider;
use docshape_query::Query;
use docshape_store::{Collection, IndexSpec, MemoryStore, Store, WriteFailureKind};

fn companies(count: usize, seed: u64) -> Vec<NewCompany> {
    let mut provider = FakeProvider::seeded(seed);
    CompanyGenerator::new(&mut provider, common::today()).chunk(count)
}

fn named(name: &str) -> NewCompany {
    NewCompany {
        name: name.into(),
        address: "1 Main St".into(),
        founded: DateTime::from_millis(0),
    }
}

#[test]
fn chunked_load_inserts_same_count_as_single_chunk() {
    let records = companies(250, 11);

    let chunked = MemoryStore::new();
    let report = BulkLoader::<_, CompaniesRef>::new(&chunked, 40)
        .load_from(records.clone())
        .unwrap();
    assert_eq!(report.stats.chunks, 7);
    assert_eq!(report.stats.inserted, 250);

    let single = MemoryStore::new();
    let report = BulkLoader::<_, CompaniesRef>::new(&single, 1_000)
        .load_from(records)
        .unwrap();
    assert_eq!(report.stats.chunks, 1);
    assert_eq!(report.stats.inserted, 250);

    assert_eq!(common::count::<CompaniesRef>(&chunked), 250);
    assert_eq!(common::count::<CompaniesRef>(&single), 250);
}

#[test]
fn generated_load_produces_exact_total() {
    let store = MemoryStore::new();
    let mut provider = FakeProvider::seeded(5);
    let mut generator = CompanyGenerator::new(&mut provider, common::today());
    let mut requested = Vec::new();
    let report = BulkLoader::<_, CompaniesRef>::new(&store, 30)
        .load_generated(100, |count| {
            requested.push(count);
            generator.chunk(count)
        })
        .unwrap();
    assert_eq!(requested, vec![30, 30, 30, 10]);
    assert_eq!(report.stats.inserted, 100);
    assert!(report.ids.is_empty());
}

#[test]
fn ids_follow_insertion_order() {
    let store = MemoryStore::new();
    let report = BulkLoader::<_, CompaniesRef>::new(&store, 2)
        .backfill(Backfill::Ids)
        .load_from(vec![named("a"), named("b"), named("c")])
        .unwrap();
    assert_eq!(report.ids.len(), 3);
    assert!(report.retained.is_empty());

    let stored: Vec<_> = Collection::<_, CompaniesRef>::new(&store)
        .find(&Query::all())
        .unwrap()
        .map(|company| company.unwrap())
        .collect();
    let names: Vec<&str> = stored.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);
    let ids: Vec<_> = stored.iter().map(|c| c.id).collect();
    assert_eq!(ids, report.ids);
}

#[test]
fn rejected_records_are_skipped_and_the_load_continues() {
    let store = MemoryStore::new();
    store
        .create_index("companies_ref", &IndexSpec::asc("name").unique())
        .unwrap();

    let records = vec![named("a"), named("b"), named("a"), named("c"), named("b")];
    let report = BulkLoader::<_, CompaniesRef>::new(&store, 2)
        .backfill(Backfill::Records)
        .load_from(records)
        .unwrap();

    assert_eq!(report.stats.inserted, 3);
    assert_eq!(report.stats.submitted(), 5);
    let skipped: Vec<usize> = report.stats.skipped.iter().map(|s| s.index).collect();
    assert_eq!(skipped, vec![2, 4]);
    assert!(
        report
            .stats
            .skipped
            .iter()
            .all(|s| s.kind == WriteFailureKind::DuplicateKey)
    );

    // Only inserted records are retained, each with its own id.
    let retained: Vec<&str> = report
        .retained
        .iter()
        .map(|(_, c)| c.name.as_str())
        .collect();
    assert_eq!(retained, ["a", "b", "c"]);
    assert_eq!(report.ids.len(), 3);
    assert_eq!(common::count::<CompaniesRef>(&store), 3);
}

#[test]
fn loader_creates_indexes_before_first_chunk() {
    let store = MemoryStore::new();
    BulkLoader::<_, CompaniesRef>::new(&store, 10)
        .load_from(Vec::new())
        .unwrap();
    let names = store.index_names("companies_ref").unwrap();
    assert!(names.contains(&"name_1".to_string()));
    assert!(names.contains(&"founded_1".to_string()));
    assert!(names.contains(&"name_text".to_string()));
}
