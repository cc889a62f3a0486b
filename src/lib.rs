//! tablemirror - a local SQLite mirror of a remote table service.
//!
//! Every remote table gets a physical table in a local SQLite file. Rows are
//! handed out as [`db::LiveRow`]s that write each change straight back to
//! the mirror, and optionally on to the remote authority. Large binary
//! values live as files under `media_files/` and rows hold only a reference
//! to them.
//!
//! # Example
//!
//! ```no_run
//! use tablemirror::catalog::{ColumnDef, DataType, KeyResolver, TableSchema};
//! use tablemirror::db::{Database, RowValues};
//! use tablemirror::predicate::{Predicate, Query};
//!
//! let db = Database::open("./local.db")
//!     .unwrap()
//!     .with_keys(KeyResolver::new().single("scores", "uid"));
//! db.apply_schema(&TableSchema::new(
//!     "scores",
//!     vec![
//!         ColumnDef::new("uid", DataType::Text),
//!         ColumnDef::new("score", DataType::Integer),
//!     ],
//! ))
//! .unwrap();
//!
//! let scores = db.table("scores").unwrap();
//! scores.add(RowValues::new().with("uid", "u1").with("score", 5)).unwrap();
//!
//! let mut row = scores.get(Query::new().eq("uid", "u1")).unwrap().unwrap();
//! row.set("score", 9).unwrap();
//!
//! let high = scores.search(Predicate::gt("score", 7)).unwrap();
//! assert_eq!(high.len(), 1);
//! ```

pub mod catalog;
pub mod codec;
pub mod db;
pub mod media;
pub mod predicate;
pub mod remote;
pub mod storage;

pub use db::{Database, DatabaseError, DatabaseResult, LiveRow, MirrorConfig, Table};
