#![allow(dead_code)]

use bson::{Document, doc};
use docshape_store::{MemoryStore, Store};

pub const COMPANIES: &str = "companies";
pub const PERSONS: &str = "persons";

pub fn mem_store() -> MemoryStore {
    MemoryStore::new()
}

/// Two companies, three persons: Acme has two employees, Globex one.
pub fn seed_company_graph(store: &MemoryStore) {
    store
        .insert_many(
            COMPANIES,
            vec![
                doc! { "_id": 1, "name": "Acme" },
                doc! { "_id": 2, "name": "Globex Company" },
                doc! { "_id": 3, "name": "Initech" },
            ],
        )
        .unwrap();
    store
        .insert_many(
            PERSONS,
            vec![
                doc! { "first_name": "Ada", "last_name": "Lovelace", "company_id": 1, "age": 36 },
                doc! { "first_name": "Grace", "last_name": "Hopper", "company_id": 1, "age": 85 },
                doc! { "first_name": "Alan", "last_name": "Turing", "company_id": 2, "age": 41 },
            ],
        )
        .unwrap();
}

pub fn collect(iter: docshape_store::DocumentIter<'_>) -> Vec<Document> {
    iter.collect::<Result<Vec<_>, _>>().unwrap()
}
