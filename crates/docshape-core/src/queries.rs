//! The four benchmark operations expressed per model.

use docshape_query::{Expr, FilterGroup, Operator, Pipeline, Sort, Update};
use docshape_store::Schema;

use crate::harness::{HarnessConfig, Model, QueryKind};
use crate::model::{CompaniesEmbedded, CompaniesRef, PersonsEmbedded, PersonsRef};

pub(crate) enum Operation {
    Read {
        collection: &'static str,
        pipeline: Pipeline,
    },
    Write {
        collection: &'static str,
        filter: FilterGroup,
        update: Update,
    },
}

impl Operation {
    pub(crate) fn collection(&self) -> &'static str {
        match self {
            Operation::Read { collection, .. } | Operation::Write { collection, .. } => *collection,
        }
    }
}

pub(crate) fn operation(model: Model, query: QueryKind, config: &HarnessConfig) -> Operation {
    match query {
        QueryKind::PersonsWithCompany => persons_with_company(model),
        QueryKind::EmployeesPerCompany => employees_per_company(model),
        QueryKind::ResetAges => reset_ages(model, config),
        QueryKind::RenameCompanies => rename_companies(model, config),
    }
}

fn full_name(prefix: &str) -> Expr {
    Expr::Concat(vec![
        Expr::field(format!("{prefix}first_name")),
        Expr::literal(" "),
        Expr::field(format!("{prefix}last_name")),
    ])
}

fn persons_with_company(model: Model) -> Operation {
    match model {
        Model::Reference => Operation::Read {
            collection: PersonsRef::NAME,
            pipeline: Pipeline::new()
                .lookup(CompaniesRef::NAME, "company_id", "_id", "company")
                .unwind("company")
                .project([
                    ("full_name", full_name("")),
                    ("company_name", Expr::field("company.name")),
                ]),
        },
        Model::EmbeddedCompany => Operation::Read {
            collection: PersonsEmbedded::NAME,
            pipeline: Pipeline::new().project([
                ("full_name", full_name("")),
                ("company_name", Expr::field("company.name")),
            ]),
        },
        Model::EmbeddedEmployees => Operation::Read {
            collection: CompaniesEmbedded::NAME,
            pipeline: Pipeline::new().unwind("employees").project([
                ("full_name", full_name("employees.")),
                ("company_name", Expr::field("name")),
            ]),
        },
    }
}

fn employee_counts(pipeline: Pipeline) -> Pipeline {
    pipeline
        .project([
            ("name", Expr::field("name")),
            ("num_employees", Expr::size(Expr::field("employees"))),
        ])
        .sort(Sort::desc("num_employees"))
        .sort(Sort::asc("name"))
}

fn employees_per_company(model: Model) -> Operation {
    match model {
        Model::Reference => Operation::Read {
            collection: CompaniesRef::NAME,
            pipeline: employee_counts(Pipeline::new().lookup(
                PersonsRef::NAME,
                "_id",
                "company_id",
                "employees",
            )),
        },
        // The company roster only exists in companies_ref.
        Model::EmbeddedCompany => Operation::Read {
            collection: CompaniesRef::NAME,
            pipeline: employee_counts(Pipeline::new().lookup(
                PersonsEmbedded::NAME,
                "_id",
                "company._id",
                "employees",
            )),
        },
        Model::EmbeddedEmployees => Operation::Read {
            collection: CompaniesEmbedded::NAME,
            pipeline: employee_counts(Pipeline::new()),
        },
    }
}

fn reset_ages(model: Model, config: &HarnessConfig) -> Operation {
    let born_before = |field: &str| FilterGroup::condition(field, Operator::Lt, config.cutoff);
    match model {
        Model::Reference => Operation::Write {
            collection: PersonsRef::NAME,
            filter: born_before("birth_date"),
            update: Update::set("age", config.new_age),
        },
        Model::EmbeddedCompany => Operation::Write {
            collection: PersonsEmbedded::NAME,
            filter: born_before("birth_date"),
            update: Update::set("age", config.new_age),
        },
        Model::EmbeddedEmployees => Operation::Write {
            collection: CompaniesEmbedded::NAME,
            filter: born_before("employees.birth_date"),
            update: Update::set("employees.$[e].age", config.new_age)
                .array_filter("e", born_before("birth_date")),
        },
    }
}

fn rename_companies(model: Model, config: &HarnessConfig) -> Operation {
    let (collection, field) = match model {
        Model::Reference => (CompaniesRef::NAME, "name"),
        Model::EmbeddedCompany => (PersonsEmbedded::NAME, "company.name"),
        Model::EmbeddedEmployees => (CompaniesEmbedded::NAME, "name"),
    };
    Operation::Write {
        collection,
        filter: FilterGroup::condition(field, Operator::NotEndsWith, config.suffix.as_str()),
        update: Update::append_str(field, config.suffix.clone()),
    }
}

#[cfg(test)]
mod tests {
    use docshape_query::{Stage, UpdateOp};

    use super::*;

    #[test]
    fn embedded_employees_update_targets_matching_elements() {
        let op = operation(
            Model::EmbeddedEmployees,
            QueryKind::ResetAges,
            &HarnessConfig::default(),
        );
        let Operation::Write { update, .. } = op else {
            panic!("expected a write");
        };
        assert_eq!(update.ops[0].field, "employees.$[e].age");
        assert!(update.array_filter_for("e").is_some());
    }

    #[test]
    fn rename_on_embedded_company_touches_nested_name() {
        let op = operation(
            Model::EmbeddedCompany,
            QueryKind::RenameCompanies,
            &HarnessConfig::default(),
        );
        assert_eq!(op.collection(), PersonsEmbedded::NAME);
        let Operation::Write { update, .. } = op else {
            panic!("expected a write");
        };
        assert_eq!(update.ops[0].field, "company.name");
        assert_eq!(update.ops[0].op, UpdateOp::AppendStr(" Company".into()));
    }

    #[test]
    fn reference_join_unwinds_company() {
        let op = operation(
            Model::Reference,
            QueryKind::PersonsWithCompany,
            &HarnessConfig::default(),
        );
        let Operation::Read { pipeline, .. } = op else {
            panic!("expected a read");
        };
        assert!(matches!(pipeline.stages[0], Stage::Lookup { .. }));
        assert_eq!(pipeline.stages[1], Stage::Unwind("company".into()));
    }
}
