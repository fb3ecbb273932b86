//! Transaction execution plan (spec §4.7): a DAG of statement plans with
//! dependency counts and inter-statement result placeholders.

pub mod statement;
pub mod transaction_plan;

pub use statement::{PlaceholderTarget, StatementKind, StatementPlan};
pub use transaction_plan::TransactionPlan;
