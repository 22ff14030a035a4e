//! # Database Module
//!
//! Everything that talks to the SQL store: the in-memory dataset model, the
//! SQL column types derived from it, statement text, the `Store` seam with
//! its DuckDB implementation, and the table sync engine built on top.

pub mod column;
pub mod dataset;
pub mod engine;
pub mod migration;
pub mod schema;
pub(crate) mod statement;
pub mod store;
pub mod value;
