//! sqlx-backed [`ExecutionUnit`](crate::ExecutionUnit) implementations.
//!
//! Each backend module implements the unit for its connection type and for
//! `Pool<DB>`, with the backend's native bind-marker dialect (`$n` for
//! PostgreSQL, `?` for MySQL and SQLite). Batched execution runs the
//! rendered statement once per parameter set on the same executor; sqlx
//! caches the prepared statement per connection, so the loop reuses one
//! prepared statement.
//!
//! Generated-key capture differs per backend:
//! - SQLite and MySQL report the last-insert id as a single-row,
//!   single-column key tuple. That id is only meaningful after an `INSERT`.
//! - PostgreSQL has no last-insert id; the unit captures the rows the
//!   statement itself returns, so the statement text must carry a
//!   `RETURNING` clause naming the key columns.

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
