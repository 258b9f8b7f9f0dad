mod filter;
mod operator;
mod pipeline;
mod query;
mod sort;
pub mod update;

pub use filter::{Filter, FilterGroup, FilterNode, LogicalOp};
pub use operator::Operator;
pub use pipeline::{Accumulator, AggregateOptions, Expr, Pipeline, Stage};
pub use query::Query;
pub use sort::{Sort, SortDirection};
pub use update::{ArrayFilter, FieldUpdate, Update, UpdateOp};
