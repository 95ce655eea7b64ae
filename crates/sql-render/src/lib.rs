//! Destination SQL rendering.
//!
//! Turns shape deltas into DDL and (shape, data point) pairs into
//! parameterized upserts. Rendering is deterministic: identical inputs yield
//! byte-identical SQL, with ascending column-name order as the single source
//! of ordering.

mod ddl;
mod dml;
mod ident;
mod types;

pub use ddl::render_shape_change;
pub use dml::{
    SCRATCH_UPSERT_PLAN, UpsertPlan, param_values, render_stored_procedure,
    render_upsert,
};
pub use ident::{qualify_name, quote, scrub};
pub use types::{from_sql_type, to_sql_type};

/// The SQL dialects a relational destination can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MariaDb,
    Mssql,
}

impl Dialect {
    /// The identifier quote characters for this dialect.
    pub(crate) fn quotes(self) -> (char, char) {
        match self {
            Dialect::MariaDb => ('`', '`'),
            Dialect::Mssql => ('[', ']'),
        }
    }
}
