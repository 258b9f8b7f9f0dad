//! Record shapes for the three physical models and the schema markers that
//! bind them to their collections.

use bson::DateTime;
use bson::oid::ObjectId;
use docshape_store::{IndexSpec, Schema};
use serde::{Deserialize, Serialize};

/// Generated company, before the store assigns its `_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub address: String,
    pub founded: DateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub address: String,
    pub founded: DateTime,
}

impl Company {
    pub fn from_new(id: ObjectId, company: NewCompany) -> Self {
        Self {
            id,
            name: company.name,
            address: company.address,
            founded: company.founded,
        }
    }
}

/// Model R person. `age` is fixed at generation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: DateTime,
    pub age: i32,
    pub company_id: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedCompany {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub address: String,
}

impl From<&Company> for EmbeddedCompany {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id,
            name: company.name.clone(),
            address: company.address.clone(),
        }
    }
}

/// Model E-in-P person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonWithCompany {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: DateTime,
    pub age: i32,
    pub company: EmbeddedCompany,
}

impl PersonWithCompany {
    pub fn embed(person: &Person, company: &EmbeddedCompany) -> Self {
        Self {
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            birth_date: person.birth_date,
            age: person.age,
            company: company.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: DateTime,
    pub age: i32,
}

impl From<Person> for Employee {
    fn from(person: Person) -> Self {
        Self {
            first_name: person.first_name,
            last_name: person.last_name,
            birth_date: person.birth_date,
            age: person.age,
        }
    }
}

/// Model E-in-C company. `employees` is always written, empty or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyWithEmployees {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub address: String,
    pub founded: DateTime,
    pub employees: Vec<Employee>,
}

impl CompanyWithEmployees {
    pub fn new(company: Company, employees: Vec<Employee>) -> Self {
        Self {
            id: company.id,
            name: company.name,
            address: company.address,
            founded: company.founded,
            employees,
        }
    }
}

/// Secondary indexes created before a collection is first loaded.
pub trait Indexed: Schema {
    fn indexes() -> Vec<IndexSpec>;
}

pub struct CompaniesRef;
pub struct PersonsRef;
pub struct PersonsEmbedded;
pub struct CompaniesEmbedded;

impl Schema for CompaniesRef {
    const NAME: &'static str = "companies_ref";
    type Insert = NewCompany;
    type Stored = Company;
}

impl Schema for PersonsRef {
    const NAME: &'static str = "persons_ref";
    type Insert = Person;
    type Stored = Person;
}

impl Schema for PersonsEmbedded {
    const NAME: &'static str = "persons_emb";
    type Insert = PersonWithCompany;
    type Stored = PersonWithCompany;
}

impl Schema for CompaniesEmbedded {
    const NAME: &'static str = "companies_emb";
    type Insert = CompanyWithEmployees;
    type Stored = CompanyWithEmployees;
}

impl Indexed for CompaniesRef {
    fn indexes() -> Vec<IndexSpec> {
        vec![
            IndexSpec::asc("name"),
            IndexSpec::asc("founded"),
            IndexSpec::text("name"),
        ]
    }
}

impl Indexed for PersonsRef {
    fn indexes() -> Vec<IndexSpec> {
        vec![
            IndexSpec::asc("company_id"),
            IndexSpec::asc("birth_date"),
            IndexSpec::asc("age"),
            IndexSpec::asc("last_name"),
            IndexSpec::compound(&["first_name", "last_name"]),
        ]
    }
}

impl Indexed for PersonsEmbedded {
    fn indexes() -> Vec<IndexSpec> {
        vec![
            IndexSpec::asc("company._id"),
            IndexSpec::asc("birth_date"),
            IndexSpec::asc("age"),
            IndexSpec::compound(&["first_name", "last_name"]),
            IndexSpec::asc("company.name"),
        ]
    }
}

impl Indexed for CompaniesEmbedded {
    fn indexes() -> Vec<IndexSpec> {
        vec![
            IndexSpec::asc("name"),
            IndexSpec::asc("founded"),
            IndexSpec::asc("employees.last_name"),
            IndexSpec::asc("employees.birth_date"),
            IndexSpec::text("name"),
        ]
    }
}

/// Every collection a population run owns, in build order.
pub const ALL_COLLECTIONS: [&str; 4] = [
    CompaniesRef::NAME,
    PersonsRef::NAME,
    PersonsEmbedded::NAME,
    CompaniesEmbedded::NAME,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Person {
        Person {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            birth_date: DateTime::from_millis(0),
            age: 40,
            company_id: ObjectId::new(),
        }
    }

    #[test]
    fn company_with_no_employees_serializes_empty_array() {
        let company = Company {
            id: ObjectId::new(),
            name: "Acme".into(),
            address: "1 Road".into(),
            founded: DateTime::from_millis(0),
        };
        let doc = bson::to_document(&CompanyWithEmployees::new(company, Vec::new())).unwrap();
        assert_eq!(doc.get_array("employees").unwrap().len(), 0);
        assert!(doc.get_object_id("_id").is_ok());
    }

    #[test]
    fn embedded_person_carries_company_identity() {
        let person = person();
        let company = EmbeddedCompany {
            id: person.company_id,
            name: "Acme".into(),
            address: "1 Road".into(),
        };
        let doc = bson::to_document(&PersonWithCompany::embed(&person, &company)).unwrap();
        let embedded = doc.get_document("company").unwrap();
        assert_eq!(embedded.get_object_id("_id").unwrap(), person.company_id);
        assert!(!doc.contains_key("company_id"));
    }

    #[test]
    fn employee_drops_company_reference() {
        let doc = bson::to_document(&Employee::from(person())).unwrap();
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.get_i32("age").unwrap(), 40);
    }
}
